//! Small helpers shared by the reader, the part library and the exporter

use nalgebra::Matrix3;

/// Normalise a model or file name for lookups
///
/// Names compare case-insensitively and with either path separator, so
/// `"S\\3001S01.DAT"` and `"s/3001s01.dat"` are the same key.
///
/// # Example
///
/// ```
/// use libldr::utils::normalize_name;
///
/// assert_eq!(normalize_name("  48\\Ring3.DAT "), "48/ring3.dat");
/// ```
pub fn normalize_name(name: &str) -> String {
    name.trim().replace('\\', "/").to_lowercase()
}

/// File name without any directory prefix
pub fn base_name(name: &str) -> &str {
    let name = name.trim_end_matches(['/', '\\']);
    match name.rfind(['/', '\\']) {
        Some(i) => &name[i + 1..],
        None => name,
    }
}

/// True when the name designates a stud primitive (`stud.dat`, `stud2a.dat`, `48/stud4.dat`, ...)
pub fn is_stud(name: &str) -> bool {
    let base = normalize_name(base_name(name));
    base.starts_with("stud") && base.ends_with(".dat")
}

/// Determinant of the linear part of a transform
///
/// A negative value means the transform mirrors geometry and flips winding.
pub fn det3(m: &Matrix3<f32>) -> f32 {
    m.determinant()
}
