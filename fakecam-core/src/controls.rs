//! `android.control.*` 枚举值
//!
//! 设置中以 u8 存放；解析失败 (未知数值) 由调用方转换成 `BadValue`。

macro_rules! u8_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $($variant:ident = $value:expr),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
        #[repr(u8)]
        pub enum $name {
            $($variant = $value),+
        }

        impl TryFrom<u8> for $name {
            type Error = u8;

            fn try_from(v: u8) -> std::result::Result<Self, u8> {
                match v {
                    $(x if x == $value => Ok(Self::$variant),)+
                    other => Err(other),
                }
            }
        }

        impl From<$name> for u8 {
            fn from(v: $name) -> u8 {
                v as u8
            }
        }
    };
}

u8_enum! {
    /// 3A 总开关
    pub enum ControlMode { Off = 0, Auto = 1, UseSceneMode = 2 }
}

u8_enum! {
    pub enum SceneMode {
        Disabled = 0,
        FacePriority = 1,
        Action = 2,
        Portrait = 3,
        Landscape = 4,
        Night = 5,
        NightPortrait = 6,
        Theatre = 7,
        Beach = 8,
        Snow = 9,
        Sunset = 10,
        SteadyPhoto = 11,
        Fireworks = 12,
        Sports = 13,
        Party = 14,
        Candlelight = 15,
        Barcode = 16,
    }
}

u8_enum! {
    pub enum AeMode {
        Off = 0,
        On = 1,
        OnAutoFlash = 2,
        OnAlwaysFlash = 3,
        OnAutoFlashRedeye = 4,
    }
}

u8_enum! {
    pub enum AeLock { Off = 0, On = 1 }
}

u8_enum! {
    pub enum AePrecaptureTrigger { Idle = 0, Start = 1 }
}

u8_enum! {
    pub enum AeState {
        Inactive = 0,
        Searching = 1,
        Converged = 2,
        Locked = 3,
        FlashRequired = 4,
        Precapture = 5,
    }
}

u8_enum! {
    pub enum AfMode {
        Off = 0,
        Auto = 1,
        Macro = 2,
        ContinuousVideo = 3,
        ContinuousPicture = 4,
        Edof = 5,
    }
}

impl AfMode {
    /// 单次对焦模式：START 触发一次主动扫描
    pub fn is_single_shot(&self) -> bool {
        matches!(self, Self::Auto | Self::Macro)
    }

    pub fn is_continuous(&self) -> bool {
        matches!(self, Self::ContinuousVideo | Self::ContinuousPicture)
    }
}

u8_enum! {
    pub enum AfTrigger { Idle = 0, Start = 1, Cancel = 2 }
}

u8_enum! {
    pub enum AfState {
        Inactive = 0,
        PassiveScan = 1,
        PassiveFocused = 2,
        ActiveScan = 3,
        FocusedLocked = 4,
        NotFocusedLocked = 5,
    }
}

u8_enum! {
    pub enum AwbMode {
        Off = 0,
        Auto = 1,
        Incandescent = 2,
        Fluorescent = 3,
        WarmFluorescent = 4,
        Daylight = 5,
        CloudyDaylight = 6,
        Twilight = 7,
        Shade = 8,
    }
}

u8_enum! {
    pub enum AwbState { Inactive = 0, Searching = 1, Converged = 2, Locked = 3 }
}

u8_enum! {
    pub enum CaptureIntent {
        Custom = 0,
        Preview = 1,
        StillCapture = 2,
        VideoRecord = 3,
        VideoSnapshot = 4,
        ZeroShutterLag = 5,
    }
}

/// 处理模块 (降噪、锐化等) 的质量档位，模板里统一使用
pub mod processing {
    pub const OFF: u8 = 0;
    pub const FAST: u8 = 1;
    pub const HIGH_QUALITY: u8 = 2;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_known_values() {
        assert_eq!(AfState::try_from(4), Ok(AfState::FocusedLocked));
        assert_eq!(u8::from(AeState::Precapture), 5);
    }

    #[test]
    fn unknown_value_is_returned_as_error() {
        assert_eq!(AeMode::try_from(42), Err(42));
        assert_eq!(AfTrigger::try_from(3), Err(3));
    }

    #[test]
    fn af_mode_classes() {
        assert!(AfMode::Macro.is_single_shot());
        assert!(AfMode::ContinuousVideo.is_continuous());
        assert!(!AfMode::Off.is_single_shot() && !AfMode::Off.is_continuous());
    }
}
