//! LDraw colour identifiers and the static colour table
//!
//! A [`Color`] is a plain numeric id. Ids 16 ("main") and 24 ("edge") carry no
//! RGBA of their own: they resolve against an enclosing colour supplied by the
//! caller. Ids of the form `0x2RRGGBB` are direct colours with literal RGB.
//!
//! The table is small enough that every entry has a compact 7-bit index,
//! which is what the binary archive stores instead of the raw id.

use std::fmt;

/// Width of a colour index in the binary archive
pub const COLOR_INDEX_BITS: u32 = 7;

/// Surface finish of a colour
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Material {
    /// Plain opaque plastic
    Solid,
    /// Translucent plastic; the alpha channel is below 255
    Transparent,
    /// Mirror finish
    Chrome,
    /// Pearl finish
    Pearlescent,
    /// Metallic paint
    Metal,
    /// Rubber
    Rubber,
    /// Base colour with small specks of a second colour
    Speckle {
        /// Speck colour as `0xRRGGBB`
        value: u32,
        /// Fraction of the surface covered by specks
        fraction: f32,
        /// Minimum speck size
        min_size: f32,
        /// Maximum speck size
        max_size: f32,
    },
    /// Translucent base with glitter particles
    Glitter {
        /// Glitter colour as `0xRRGGBB`
        value: u32,
        /// Fraction of the surface covered by glitter
        fraction: f32,
        /// Fraction of the volume filled with glitter
        vfraction: f32,
        /// Particle size
        size: f32,
    },
}

/// Resolved attributes of a colour id
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorEntity {
    /// Colour id
    pub id: u32,
    /// LDConfig name
    pub name: &'static str,
    /// Face colour
    pub rgba: [u8; 4],
    /// Edge (complement) colour
    pub complement: [u8; 4],
    /// Surface finish
    pub material: Material,
}

impl ColorEntity {
    /// Face colour scaled to `0.0..=1.0`
    pub fn rgba_f32(&self) -> [f32; 4] {
        to_f32(self.rgba)
    }

    /// Edge colour scaled to `0.0..=1.0`
    pub fn complement_f32(&self) -> [f32; 4] {
        to_f32(self.complement)
    }

    /// Face colour packed as `0xRRGGBBAA`
    pub fn packed_rgba(&self) -> u32 {
        u32::from_be_bytes(self.rgba)
    }

    /// Edge colour packed as `0xRRGGBBAA`
    pub fn packed_complement(&self) -> u32 {
        u32::from_be_bytes(self.complement)
    }

    /// True when the face colour is not fully opaque
    pub fn is_transparent(&self) -> bool {
        self.rgba[3] < 255
    }
}

fn to_f32(c: [u8; 4]) -> [f32; 4] {
    c.map(|v| f32::from(v) / 255.0)
}

const fn rgb(value: u32, alpha: u8) -> [u8; 4] {
    [
        (value >> 16) as u8,
        (value >> 8) as u8,
        value as u8,
        alpha,
    ]
}

const fn entry(
    id: u32,
    name: &'static str,
    value: u32,
    edge: u32,
    alpha: u8,
    material: Material,
) -> ColorEntity {
    ColorEntity {
        id,
        name,
        rgba: rgb(value, alpha),
        complement: rgb(edge, 255),
        material,
    }
}

const fn solid(id: u32, name: &'static str, value: u32, edge: u32) -> ColorEntity {
    entry(id, name, value, edge, 255, Material::Solid)
}

const fn trans(id: u32, name: &'static str, value: u32, edge: u32) -> ColorEntity {
    entry(id, name, value, edge, 128, Material::Transparent)
}

const fn finish(id: u32, name: &'static str, value: u32, edge: u32, m: Material) -> ColorEntity {
    entry(id, name, value, edge, 255, m)
}

/// Standard LDConfig colours, sorted by id
static COLORS: &[ColorEntity] = &[
    solid(0, "Black", 0x1B2A34, 0x808080),
    solid(1, "Blue", 0x1E5AA8, 0x333333),
    solid(2, "Green", 0x00852B, 0x333333),
    solid(3, "Dark_Turquoise", 0x069D9F, 0x333333),
    solid(4, "Red", 0xB40000, 0x333333),
    solid(5, "Dark_Pink", 0xD3359D, 0x333333),
    solid(6, "Brown", 0x543324, 0x1E1E1E),
    solid(7, "Light_Gray", 0x8A928D, 0x333333),
    solid(8, "Dark_Gray", 0x545955, 0x333333),
    solid(9, "Light_Blue", 0x97CBD9, 0x333333),
    solid(10, "Bright_Green", 0x58AB41, 0x333333),
    solid(11, "Light_Turquoise", 0x00AAA4, 0x333333),
    solid(12, "Salmon", 0xF06D61, 0x333333),
    solid(13, "Pink", 0xF6A9BB, 0x333333),
    solid(14, "Yellow", 0xFAC80A, 0x333333),
    solid(15, "White", 0xF4F4F4, 0x333333),
    solid(16, "Main_Colour", 0x7F7F7F, 0x333333),
    solid(17, "Light_Green", 0xADD9A8, 0x333333),
    solid(18, "Light_Yellow", 0xFFD67F, 0x333333),
    solid(19, "Tan", 0xB0A06F, 0x333333),
    solid(20, "Light_Violet", 0xAFBED6, 0x333333),
    solid(22, "Purple", 0x671F81, 0x333333),
    solid(23, "Dark_Blue_Violet", 0x0E3E9A, 0x333333),
    solid(24, "Edge_Colour", 0x7F7F7F, 0x333333),
    solid(25, "Orange", 0xD67923, 0x333333),
    solid(26, "Magenta", 0x901F76, 0x333333),
    solid(27, "Lime", 0xA5CA18, 0x333333),
    solid(28, "Dark_Tan", 0x897D62, 0x333333),
    solid(29, "Bright_Pink", 0xFF9ECD, 0x333333),
    solid(30, "Medium_Lavender", 0xA06EB9, 0x333333),
    solid(31, "Lavender", 0xCDA4DE, 0x333333),
    trans(33, "Trans_Dark_Blue", 0x0020A0, 0x000B38),
    trans(34, "Trans_Green", 0x237841, 0x184632),
    trans(35, "Trans_Bright_Green", 0x56E646, 0x9DF095),
    trans(36, "Trans_Red", 0xC91A09, 0x880000),
    trans(37, "Trans_Dark_Pink", 0xDF6695, 0xA32A59),
    trans(38, "Trans_Neon_Orange", 0xFF800D, 0xBD2400),
    trans(39, "Trans_Very_Light_Blue", 0xC1DFF0, 0x84A5B4),
    trans(40, "Trans_Black", 0x635F52, 0x171316),
    trans(41, "Trans_Medium_Blue", 0x559AB7, 0x196973),
    trans(42, "Trans_Neon_Green", 0xC0FF00, 0x84C300),
    trans(43, "Trans_Light_Blue", 0xAEE9EF, 0x72B3B0),
    trans(44, "Trans_Bright_Reddish_Lilac", 0x96709F, 0x5A3463),
    trans(45, "Trans_Pink", 0xFC97AC, 0xF8587F),
    trans(46, "Trans_Yellow", 0xF5CD2F, 0x8E7400),
    trans(47, "Trans_Clear", 0xFCFCFC, 0xC3C3C3),
    trans(52, "Trans_Purple", 0xA5A5CB, 0x280025),
    trans(54, "Trans_Neon_Yellow", 0xDAB000, 0xC3BA3F),
    trans(57, "Trans_Orange", 0xF08F1C, 0xA45C28),
    solid(68, "Very_Light_Orange", 0xF3CF9B, 0x333333),
    solid(69, "Light_Purple", 0xCD6298, 0x333333),
    solid(70, "Reddish_Brown", 0x582A12, 0x333333),
    solid(71, "Light_Bluish_Gray", 0xA0A5A9, 0x333333),
    solid(72, "Dark_Bluish_Gray", 0x6C6E68, 0x333333),
    solid(73, "Medium_Blue", 0x5C9DD1, 0x333333),
    solid(74, "Medium_Green", 0x73DCA1, 0x333333),
    solid(77, "Light_Pink", 0xFECCCF, 0x333333),
    solid(78, "Light_Nougat", 0xF6D7B3, 0x333333),
    entry(79, "Milky_White", 0xFFFFFF, 0xC3C3C3, 224, Material::Transparent),
    finish(80, "Metallic_Silver", 0x767676, 0x333333, Material::Metal),
    finish(81, "Metallic_Green", 0x899B5F, 0x333333, Material::Metal),
    finish(82, "Metallic_Gold", 0xDBAC34, 0x333333, Material::Metal),
    solid(84, "Medium_Nougat", 0xAA7D55, 0x333333),
    solid(85, "Dark_Purple", 0x3F3691, 0x1E1E1E),
    solid(86, "Light_Brown", 0x7C503A, 0x333333),
    solid(89, "Blue_Violet", 0x4C61DB, 0x333333),
    solid(92, "Nougat", 0xD09168, 0x333333),
    solid(100, "Light_Salmon", 0xFEBABD, 0x333333),
    solid(110, "Violet", 0x4354A3, 0x333333),
    solid(112, "Medium_Bluish_Violet", 0x6874CA, 0x333333),
    entry(
        114,
        "Glitter_Trans_Dark_Pink",
        0xDF6695,
        0x9A2A66,
        128,
        Material::Glitter {
            value: 0x923978,
            fraction: 0.17,
            vfraction: 0.2,
            size: 1.0,
        },
    ),
    solid(115, "Medium_Lime", 0xC7D23C, 0x333333),
    entry(
        117,
        "Glitter_Trans_Clear",
        0xFFFFFF,
        0xC3C3C3,
        128,
        Material::Glitter {
            value: 0xFFFFFF,
            fraction: 0.08,
            vfraction: 0.1,
            size: 1.0,
        },
    ),
    solid(118, "Aqua", 0xB3D7D1, 0x333333),
    solid(120, "Light_Lime", 0xD9E4A7, 0x333333),
    solid(125, "Light_Orange", 0xF9BA61, 0x333333),
    solid(128, "Dark_Nougat", 0xAD6140, 0x333333),
    finish(
        132,
        "Speckle_Black_Silver",
        0x000000,
        0x595959,
        Material::Speckle {
            value: 0x595959,
            fraction: 0.4,
            min_size: 1.0,
            max_size: 3.0,
        },
    ),
    finish(
        133,
        "Speckle_Black_Gold",
        0x000000,
        0xDBAC34,
        Material::Speckle {
            value: 0xAB6038,
            fraction: 0.4,
            min_size: 1.0,
            max_size: 3.0,
        },
    ),
    finish(134, "Copper", 0xAE7A59, 0x333333, Material::Pearlescent),
    finish(135, "Pearl_Light_Gray", 0x9CA3A8, 0x333333, Material::Pearlescent),
    finish(137, "Pearl_Sand_Blue", 0x7988A1, 0x333333, Material::Pearlescent),
    finish(142, "Pearl_Light_Gold", 0xDCBE61, 0x333333, Material::Pearlescent),
    finish(148, "Pearl_Dark_Gray", 0x575857, 0x333333, Material::Pearlescent),
    finish(150, "Pearl_Very_Light_Gray", 0xBBBDBC, 0x333333, Material::Pearlescent),
    solid(151, "Very_Light_Bluish_Gray", 0xE6E3E0, 0x333333),
    finish(178, "Flat_Dark_Gold", 0xB4883E, 0x333333, Material::Pearlescent),
    finish(179, "Flat_Silver", 0x898788, 0x333333, Material::Pearlescent),
    finish(183, "Pearl_White", 0xF2F3F2, 0x333333, Material::Pearlescent),
    solid(191, "Bright_Light_Orange", 0xF8BB3D, 0x333333),
    solid(212, "Bright_Light_Blue", 0x9FC3E9, 0x333333),
    solid(216, "Rust", 0xB31004, 0x333333),
    solid(226, "Bright_Light_Yellow", 0xFFF03A, 0x333333),
    solid(232, "Sky_Blue", 0x7DBFDD, 0x333333),
    finish(256, "Rubber_Black", 0x212121, 0x595959, Material::Rubber),
    solid(272, "Dark_Blue", 0x0D325B, 0x1E1E1E),
    finish(273, "Rubber_Blue", 0x0033B2, 0x333333, Material::Rubber),
    solid(288, "Dark_Green", 0x184632, 0x1E1E1E),
    entry(294, "Glow_In_Dark_Trans", 0xBDC6AD, 0x333333, 250, Material::Transparent),
    finish(297, "Pearl_Gold", 0xAA7F2E, 0x333333, Material::Pearlescent),
    solid(308, "Dark_Brown", 0x352100, 0x1E1E1E),
    solid(313, "Maersk_Blue", 0x54A9C8, 0x333333),
    solid(320, "Dark_Red", 0x720E0F, 0x333333),
    solid(321, "Dark_Azure", 0x1498D7, 0x333333),
    solid(322, "Medium_Azure", 0x3EC2DD, 0x333333),
    solid(323, "Light_Aqua", 0xBDDCD8, 0x333333),
    solid(326, "Yellowish_Green", 0xDFEEA5, 0x333333),
    solid(330, "Olive_Green", 0x9B9A5A, 0x333333),
    finish(334, "Chrome_Gold", 0xBBA53D, 0x333333, Material::Chrome),
    solid(335, "Sand_Red", 0xD67572, 0x333333),
    solid(351, "Medium_Dark_Pink", 0xF785B1, 0x333333),
    solid(366, "Earth_Orange", 0xFA9C1C, 0x333333),
    solid(373, "Sand_Purple", 0x845E84, 0x333333),
    finish(375, "Rubber_Light_Gray", 0xC1C2C1, 0x333333, Material::Rubber),
    solid(378, "Sand_Green", 0xA0BCAC, 0x333333),
    solid(379, "Sand_Blue", 0x597184, 0x333333),
    finish(383, "Chrome_Silver", 0xE0E0E0, 0xA4A4A4, Material::Chrome),
    finish(406, "Rubber_Dark_Blue", 0x001D68, 0x333333, Material::Rubber),
    finish(449, "Rubber_Purple", 0x81007B, 0x333333, Material::Rubber),
    solid(450, "Fabuland_Brown", 0xB67B50, 0x333333),
    solid(462, "Medium_Orange", 0xFFA70B, 0x333333),
    solid(484, "Dark_Orange", 0xA95500, 0x333333),
    solid(503, "Very_Light_Gray", 0xE6E3DA, 0x333333),
];

/// Every known colour, sorted by id
pub fn color_table() -> &'static [ColorEntity] {
    COLORS
}

fn lookup(id: u32) -> Option<usize> {
    COLORS.binary_search_by_key(&id, |c| c.id).ok()
}

/// A numeric LDraw colour id
///
/// # Example
///
/// ```
/// use libldr::Color;
///
/// let red = Color::new(4);
/// assert!(!red.is_null());
/// assert_eq!(red.entity().rgba, [0xB4, 0x00, 0x00, 0xFF]);
///
/// assert!(Color::MAIN.is_null());
/// let direct = Color::new(0x2FF8000);
/// assert_eq!(direct.entity().rgba, [0xFF, 0x80, 0x00, 0xFF]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Color(u32);

impl Color {
    /// "Inherit the enclosing colour"
    pub const MAIN: Color = Color(16);
    /// "Use the complement of the enclosing colour"
    pub const EDGE: Color = Color(24);

    /// Wrap a raw id
    pub const fn new(id: u32) -> Self {
        Color(id)
    }

    /// Raw id
    pub const fn id(&self) -> u32 {
        self.0
    }

    /// True for the context-dependent ids 16 and 24
    pub const fn is_null(&self) -> bool {
        self.0 == 16 || self.0 == 24
    }

    /// True for id 16
    pub const fn is_main(&self) -> bool {
        self.0 == 16
    }

    /// True for id 24
    pub const fn is_edge(&self) -> bool {
        self.0 == 24
    }

    /// True for a `0x2RRGGBB` direct colour
    pub const fn is_direct(&self) -> bool {
        self.0 >> 24 == 2
    }

    /// True when the id is in the table or is a direct colour
    pub fn is_known(&self) -> bool {
        self.is_direct() || lookup(self.0).is_some()
    }

    /// Resolve the id to its attributes
    ///
    /// Unknown ids resolve to the main colour's gray.
    pub fn entity(&self) -> ColorEntity {
        if self.is_direct() {
            let value = self.0 & 0x00FF_FFFF;
            return ColorEntity {
                id: self.0,
                name: "Direct_Colour",
                rgba: rgb(value, 255),
                complement: rgb(0x333333, 255),
                material: Material::Solid,
            };
        }
        match lookup(self.0) {
            Some(i) => COLORS[i],
            None => {
                tracing::debug!(color = self.0, "unknown colour id, using main colour");
                ColorEntity {
                    id: self.0,
                    ..COLORS[lookup(16).unwrap_or(0)]
                }
            }
        }
    }

    /// Compact table index stored by the binary archive
    ///
    /// Returns `None` for direct colours and ids missing from the table.
    pub fn index(&self) -> Option<u8> {
        if self.is_direct() {
            return None;
        }
        lookup(self.0).map(|i| i as u8)
    }

    /// Inverse of [`Color::index`]
    pub fn from_index(index: u8) -> Option<Color> {
        COLORS.get(usize::from(index)).map(|c| Color(c.id))
    }

    /// Parse a colour token, decimal or `0x` hexadecimal
    pub fn parse(token: &str) -> crate::Result<Color> {
        let value = match token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
        {
            Some(hex) => u32::from_str_radix(hex, 16)?,
            None => token.parse::<u32>()?,
        };
        Ok(Color(value))
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::MAIN
    }
}

impl From<u32> for Color {
    fn from(id: u32) -> Self {
        Color(id)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_direct() {
            write!(f, "0x{:07X}", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_sorted_and_fits_index() {
        assert!(COLORS.windows(2).all(|w| w[0].id < w[1].id));
        assert!(COLORS.len() <= 1 << COLOR_INDEX_BITS);
    }

    #[test]
    fn test_index_round_trip_for_every_entry() {
        for c in color_table() {
            let color = Color::new(c.id);
            let idx = color.index().unwrap();
            assert_eq!(Color::from_index(idx), Some(color));
        }
        assert_eq!(Color::from_index(127), None);
    }

    #[test]
    fn test_null_colors() {
        assert!(Color::MAIN.is_null());
        assert!(Color::EDGE.is_null());
        assert!(!Color::new(0).is_null());
        assert!(Color::MAIN.index().is_some());
        assert!(Color::EDGE.index().is_some());
    }

    #[test]
    fn test_direct_color() {
        let c = Color::new(0x2123456);
        assert!(c.is_direct());
        assert!(c.is_known());
        assert_eq!(c.index(), None);
        assert_eq!(c.entity().rgba, [0x12, 0x34, 0x56, 0xFF]);
        assert_eq!(c.to_string(), "0x2123456");
    }

    #[test]
    fn test_parse_hex_and_decimal() {
        assert_eq!(Color::parse("4").unwrap(), Color::new(4));
        assert_eq!(Color::parse("0x2FF0000").unwrap(), Color::new(0x2FF0000));
        assert!(Color::parse("red").is_err());
    }

    #[test]
    fn test_unknown_falls_back_to_gray() {
        let e = Color::new(9999).entity();
        assert_eq!(e.id, 9999);
        assert_eq!(e.rgba, Color::MAIN.entity().rgba);
        assert!(!Color::new(9999).is_known());
    }

    #[test]
    fn test_transparent_and_packed() {
        let trans_red = Color::new(36).entity();
        assert!(trans_red.is_transparent());
        assert_eq!(trans_red.material, Material::Transparent);
        let black = Color::new(0).entity();
        assert_eq!(black.packed_rgba(), 0x1B2A34FF);
        assert_eq!(black.packed_complement(), 0x808080FF);
        assert_eq!(black.complement_f32()[0], 128.0 / 255.0);
    }
}
