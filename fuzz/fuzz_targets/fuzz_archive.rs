#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // corrupted containers and bitstreams must surface as errors
    let Ok(mut archive) = libldr::archive::Archive::open(data.to_vec()) else {
        return;
    };
    let handles = archive.catalog().len().min(64) as u16;
    for handle in 0..handles {
        let _ = archive.load_handle(handle);
    }
});
