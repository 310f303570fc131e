#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // strict and lenient readers must both return instead of panicking
    let strict = libldr::ParserConfig::new().with_strict(true);
    let _ = libldr::ModelMultipart::from_reader_with_config(data, "fuzz.ldr", &strict);
    if let Ok(mm) = libldr::ModelMultipart::from_reader(data, "fuzz.ldr") {
        let _ = libldr::writer::multipart_to_string(&mm);
    }
});
