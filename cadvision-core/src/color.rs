//! 颜色解析：实体颜色 → 图层颜色 → ACI 调色板的确定性回退链。

use std::fmt;

/// 图层未指定颜色时使用的 ACI 索引（白/黑）。
pub const DEFAULT_LAYER_ACI: i32 = 7;

/// ACI 调色板中查不到的索引统一使用的中性灰。
pub const FALLBACK_GRAY: Rgb = Rgb(0x9CA3AF);

/// "随块" 与 "随层" 两个哨兵索引。
const BY_BLOCK: i32 = 0;
const BY_LAYER: i32 = 256;

/// 标准 ACI 1..=255 调色板，下标 0 对应索引 1。
const ACI_PALETTE: [u32; 255] = [
    0xFF0000, 0xFFFF00, 0x00FF00, 0x00FFFF, 0x0000FF, 0xFF00FF, 0xFFFFFF, 0x808080,
    0xC0C0C0, 0xFF0000, 0xFF7F7F, 0xCC0000, 0xCC6666, 0x990000, 0x994C4C, 0x7F0000,
    0x7F3F3F, 0x4C0000, 0x4C2626, 0xFF3F00, 0xFF9F7F, 0xCC3200, 0xCC7F66, 0x992600,
    0x995F4C, 0x7F1F00, 0x7F4F3F, 0x4C1300, 0x4C2F26, 0xFF7F00, 0xFFBF7F, 0xCC6600,
    0xCC9966, 0x994C00, 0x99724C, 0x7F3F00, 0x7F5F3F, 0x4C2600, 0x4C3926, 0xFFBF00,
    0xFFDF7F, 0xCC9900, 0xCCB266, 0x997200, 0x99854C, 0x7F5F00, 0x7F6F3F, 0x4C3900,
    0x4C4226, 0xFFFF00, 0xFFFF7F, 0xCCCC00, 0xCCCC66, 0x999900, 0x99994C, 0x7F7F00,
    0x7F7F3F, 0x4C4C00, 0x4C4C26, 0xBFFF00, 0xDFFF7F, 0x99CC00, 0xB2CC66, 0x729900,
    0x85994C, 0x5F7F00, 0x6F7F3F, 0x394C00, 0x424C26, 0x7FFF00, 0xBFFF7F, 0x66CC00,
    0x99CC66, 0x4C9900, 0x72994C, 0x3F7F00, 0x5F7F3F, 0x264C00, 0x394C26, 0x3FFF00,
    0x9FFF7F, 0x32CC00, 0x7FCC66, 0x269900, 0x5F994C, 0x1F7F00, 0x4F7F3F, 0x134C00,
    0x2F4C26, 0x00FF00, 0x7FFF7F, 0x00CC00, 0x66CC66, 0x009900, 0x4C994C, 0x007F00,
    0x3F7F3F, 0x004C00, 0x264C26, 0x00FF3F, 0x7FFF9F, 0x00CC32, 0x66CC7F, 0x009926,
    0x4C995F, 0x007F1F, 0x3F7F4F, 0x004C13, 0x264C2F, 0x00FF7F, 0x7FFFBF, 0x00CC66,
    0x66CC99, 0x00994C, 0x4C9972, 0x007F3F, 0x3F7F5F, 0x004C26, 0x264C39, 0x00FFBF,
    0x7FFFDF, 0x00CC99, 0x66CCB2, 0x009972, 0x4C9985, 0x007F5F, 0x3F7F6F, 0x004C39,
    0x264C42, 0x00FFFF, 0x7FFFFF, 0x00CCCC, 0x66CCCC, 0x009999, 0x4C9999, 0x007F7F,
    0x3F7F7F, 0x004C4C, 0x264C4C, 0x00BFFF, 0x7FDFFF, 0x0099CC, 0x66B2CC, 0x007299,
    0x4C8599, 0x005F7F, 0x3F6F7F, 0x00394C, 0x26424C, 0x007FFF, 0x7FBFFF, 0x0066CC,
    0x6699CC, 0x004C99, 0x4C7299, 0x003F7F, 0x3F5F7F, 0x00264C, 0x26394C, 0x003FFF,
    0x7F9FFF, 0x0032CC, 0x667FCC, 0x002699, 0x4C5F99, 0x001F7F, 0x3F4F7F, 0x00134C,
    0x262F4C, 0x0000FF, 0x7F7FFF, 0x0000CC, 0x6666CC, 0x000099, 0x4C4C99, 0x00007F,
    0x3F3F7F, 0x00004C, 0x26264C, 0x3F00FF, 0x9F7FFF, 0x3200CC, 0x7F66CC, 0x260099,
    0x5F4C99, 0x1F007F, 0x4F3F7F, 0x13004C, 0x2F264C, 0x7F00FF, 0xBF7FFF, 0x6600CC,
    0x9966CC, 0x4C0099, 0x724C99, 0x3F007F, 0x5F3F7F, 0x26004C, 0x39264C, 0xBF00FF,
    0xDF7FFF, 0x9900CC, 0xB266CC, 0x720099, 0x854C99, 0x5F007F, 0x6F3F7F, 0x39004C,
    0x42264C, 0xFF00FF, 0xFF7FFF, 0xCC00CC, 0xCC66CC, 0x990099, 0x994C99, 0x7F007F,
    0x7F3F7F, 0x4C004C, 0x4C264C, 0xFF00BF, 0xFF7FDF, 0xCC0099, 0xCC66B2, 0x990072,
    0x994C85, 0x7F005F, 0x7F3F6F, 0x4C0039, 0x4C2642, 0xFF007F, 0xFF7FBF, 0xCC0066,
    0xCC6699, 0x99004C, 0x994C72, 0x7F003F, 0x7F3F5F, 0x4C0026, 0x4C2639, 0xFF003F,
    0xFF7F9F, 0xCC0032, 0xCC667F, 0x990026, 0x994C5F, 0x7F001F, 0x7F3F4F, 0x4C0013,
    0x4C262F, 0x333333, 0x505050, 0x696969, 0x828282, 0xBEBEBE, 0xFFFFFF,
];

/// 24 位 RGB 颜色。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub u32);

impl Rgb {
    /// 规范化真彩色：负值取绝对值，再截取低 24 位。
    #[inline]
    pub fn from_true_color(raw: i64) -> Self {
        Self(normalize_true_color(raw))
    }

    #[inline]
    pub fn red(self) -> u8 {
        ((self.0 >> 16) & 0xFF) as u8
    }

    #[inline]
    pub fn green(self) -> u8 {
        ((self.0 >> 8) & 0xFF) as u8
    }

    #[inline]
    pub fn blue(self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    pub fn to_hex(self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06x}", self.0 & 0xFF_FFFF)
    }
}

#[inline]
pub fn normalize_true_color(raw: i64) -> u32 {
    (raw.unsigned_abs() & 0xFF_FFFF) as u32
}

/// 查询 ACI 调色板，1..=255 之外返回 `None`。
pub fn aci_to_rgb(index: i32) -> Option<Rgb> {
    if (1..=255).contains(&index) {
        Some(Rgb(ACI_PALETTE[(index - 1) as usize]))
    } else {
        None
    }
}

/// 实体或图层上携带的原始颜色字段。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColorSource {
    pub index: Option<i32>,
    pub true_color: Option<u32>,
}

impl ColorSource {
    #[inline]
    pub fn indexed(index: i32) -> Self {
        Self {
            index: Some(index),
            true_color: None,
        }
    }

    #[inline]
    pub fn true_color(rgb: u32) -> Self {
        Self {
            index: None,
            true_color: Some(rgb),
        }
    }
}

/// 属性面板展示用的颜色说明。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorInfo {
    pub rgb: Rgb,
    pub label: String,
    pub is_by_layer: bool,
    pub true_color: Option<u32>,
    pub aci: Option<i32>,
}

/// 解析实体最终显示颜色。总是返回可渲染的颜色，不会失败。
///
/// 优先级：实体真彩色 → 越界的实体索引（按真彩色）→ 非哨兵实体索引 →
/// 越界的图层索引 → 图层真彩色 → 图层索引（缺省 7）。
pub fn resolve_color(entity: ColorSource, layer: ColorSource) -> Rgb {
    describe_color(entity, layer).rgb
}

pub fn describe_color(entity: ColorSource, layer: ColorSource) -> ColorInfo {
    if let Some(raw) = entity.true_color {
        return true_color_info(raw as i64, "True Color", false);
    }
    if let Some(index) = entity.index {
        if index > 255 && index != BY_LAYER {
            return true_color_info(index as i64, "True Color", false);
        }
        if index != BY_BLOCK && index != BY_LAYER {
            return ColorInfo {
                rgb: aci_to_rgb(index).unwrap_or(FALLBACK_GRAY),
                label: format!("ACI {index}"),
                is_by_layer: false,
                true_color: None,
                aci: Some(index),
            };
        }
    }

    if let Some(index) = layer.index.filter(|index| *index > 255) {
        return true_color_info(index as i64, "Layer True Color", true);
    }
    if let Some(raw) = layer.true_color {
        let mut info = true_color_info(raw as i64, "Layer True Color", true);
        info.aci = layer.index;
        return info;
    }
    let index = layer.index.unwrap_or(DEFAULT_LAYER_ACI);
    ColorInfo {
        rgb: aci_to_rgb(index).unwrap_or(FALLBACK_GRAY),
        label: format!("Layer ACI {index}"),
        is_by_layer: true,
        true_color: None,
        aci: Some(index),
    }
}

fn true_color_info(raw: i64, prefix: &str, is_by_layer: bool) -> ColorInfo {
    let rgb = Rgb::from_true_color(raw);
    ColorInfo {
        rgb,
        label: format!("{prefix} ({rgb})"),
        is_by_layer,
        true_color: Some(rgb.0),
        aci: None,
    }
}
