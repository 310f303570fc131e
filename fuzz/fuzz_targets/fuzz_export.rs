#![no_main]

use libfuzzer_sys::fuzz_target;
use libldr::export::{BufferType, ExportParams, GeometryExporter, StudMode};

fuzz_target!(|data: &[u8]| {
    let Ok(mm) = libldr::ModelMultipart::from_reader(data, "fuzz.ldr") else {
        return;
    };
    for mode in [StudMode::Regular, StudMode::Line, StudMode::Square] {
        let params = ExportParams::new().with_stud_mode(mode);
        let mut exporter = GeometryExporter::for_multipart(&mm, None, params);
        for ty in BufferType::ALL {
            let _ = exporter.get_precolored_array(ty, libldr::Color::new(4));
        }
    }
});
