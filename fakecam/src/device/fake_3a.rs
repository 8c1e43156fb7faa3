//! 模拟 3A (AE / AF / AWB)
//!
//! 每个请求跑一轮：读取请求中的控制项，推进三个状态机，
//! 再把曝光参数和状态写回同一份设置里 (它随后成为结果元数据)。

use fakecam_core::controls::{
    AeLock, AeMode, AePrecaptureTrigger, AeState, AfMode, AfState, AfTrigger, AwbMode, AwbState,
    ControlMode, SceneMode,
};
use fakecam_core::error::{CameraError, Result};
use fakecam_core::metadata::{CaptureSettings, Tag};
use fakecam_core::time::{Nsecs, MSEC};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{error, trace};

pub const NORMAL_EXPOSURE_TIME: Nsecs = 10 * MSEC;
pub const FACE_PRIORITY_EXPOSURE_TIME: Nsecs = 30 * MSEC;
pub const NORMAL_SENSITIVITY: i32 = 100;

/// 每帧向目标曝光靠近的比例
pub const EXPOSURE_TRACK_RATE: f32 = 0.1;
/// 预捕获至少持续的帧数
pub const PRECAPTURE_MIN_FRAMES: u32 = 10;
/// 稳定这么多帧之后开始随机漂移
pub const STABLE_AE_MAX_FRAMES: u32 = 100;
/// 漂移幅度 (以 2 为底的 EV 偏移)
pub const EXPOSURE_WANDER_MIN: f32 = -2.0;
pub const EXPOSURE_WANDER_MAX: f32 = 1.0;

/// 3A 状态快照，用于 dump 和状态导出
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct State3A {
    pub ae_state: AeState,
    pub af_state: AfState,
    pub awb_state: AwbState,
    pub ae_trigger_id: i32,
    pub af_trigger_id: i32,
    pub exposure_time: Nsecs,
    pub sensitivity: i32,
}

#[derive(Debug)]
pub struct Fake3A {
    facing_back: bool,
    face_priority: bool,

    ae_mode: AeMode,
    af_mode: AfMode,
    awb_mode: AwbMode,

    ae_state: AeState,
    af_state: AfState,
    awb_state: AwbState,

    ae_trigger_id: i32,
    af_trigger_id: i32,

    ae_counter: u32,
    ae_current_exposure_time: Nsecs,
    ae_target_exposure_time: Nsecs,
    ae_current_sensitivity: i32,

    rng: ChaCha8Rng,
}

fn require_u8(settings: &CaptureSettings, tag: Tag, what: &str) -> Result<u8> {
    settings.find_u8(tag).ok_or_else(|| {
        error!(target: "fakecam::3a", "No {} entry!", what);
        CameraError::BadValue(format!("missing {} entry", what))
    })
}

impl Fake3A {
    /// `seed` 为 None 时从系统随机源取种子
    pub fn new(facing_back: bool, seed: Option<u64>) -> Self {
        let seed = seed.unwrap_or_else(rand::random);
        Self {
            facing_back,
            face_priority: false,
            ae_mode: AeMode::On,
            af_mode: AfMode::Auto,
            awb_mode: AwbMode::Auto,
            ae_state: AeState::Inactive,
            af_state: AfState::Inactive,
            awb_state: AwbState::Inactive,
            ae_trigger_id: 0,
            af_trigger_id: 0,
            ae_counter: 0,
            ae_current_exposure_time: NORMAL_EXPOSURE_TIME,
            ae_target_exposure_time: NORMAL_EXPOSURE_TIME,
            ae_current_sensitivity: NORMAL_SENSITIVITY,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// connect 时回到初始状态；随机源继续往下走
    pub fn reset(&mut self) {
        self.face_priority = false;
        self.ae_mode = AeMode::On;
        self.af_mode = AfMode::Auto;
        self.awb_mode = AwbMode::Auto;
        self.ae_state = AeState::Inactive;
        self.af_state = AfState::Inactive;
        self.awb_state = AwbState::Inactive;
        self.ae_trigger_id = 0;
        self.af_trigger_id = 0;
        self.ae_counter = 0;
        self.ae_current_exposure_time = NORMAL_EXPOSURE_TIME;
        self.ae_target_exposure_time = NORMAL_EXPOSURE_TIME;
        self.ae_current_sensitivity = NORMAL_SENSITIVITY;
    }

    pub fn snapshot(&self) -> State3A {
        State3A {
            ae_state: self.ae_state,
            af_state: self.af_state,
            awb_state: self.awb_state,
            ae_trigger_id: self.ae_trigger_id,
            af_trigger_id: self.af_trigger_id,
            exposure_time: self.ae_current_exposure_time,
            sensitivity: self.ae_current_sensitivity,
        }
    }

    /// 处理一个请求的 3A 控制，并把结果写回 `settings`
    pub fn process(&mut self, settings: &mut CaptureSettings) -> Result<()> {
        let control_raw = require_u8(settings, Tag::CONTROL_MODE, "control mode")?;
        let scene_raw = require_u8(settings, Tag::CONTROL_SCENE_MODE, "scene mode")?;

        match ControlMode::try_from(control_raw) {
            Ok(ControlMode::Off) => {
                self.ae_state = AeState::Inactive;
                self.af_state = AfState::Inactive;
                self.awb_state = AwbState::Inactive;
                self.update(settings);
                return Ok(());
            }
            Ok(ControlMode::UseSceneMode) => match SceneMode::try_from(scene_raw) {
                Ok(SceneMode::FacePriority) => self.face_priority = true,
                _ => {
                    error!(target: "fakecam::3a", "Emulator doesn't support scene mode {}", scene_raw);
                    return Err(CameraError::BadValue(format!(
                        "unsupported scene mode {}",
                        scene_raw
                    )));
                }
            },
            Ok(ControlMode::Auto) => self.face_priority = false,
            Err(raw) => {
                error!(target: "fakecam::3a", "Unknown control mode {}", raw);
                return Err(CameraError::BadValue(format!("unknown control mode {}", raw)));
            }
        }

        self.do_fake_ae(settings)?;
        self.do_fake_af(settings)?;
        self.do_fake_awb(settings)?;

        self.update(settings);
        Ok(())
    }

    fn target_exposure(&self) -> Nsecs {
        if self.face_priority {
            FACE_PRIORITY_EXPOSURE_TIME
        } else {
            NORMAL_EXPOSURE_TIME
        }
    }

    fn track_exposure(&mut self) {
        let diff = self.ae_target_exposure_time - self.ae_current_exposure_time;
        self.ae_current_exposure_time += (diff as f32 * EXPOSURE_TRACK_RATE) as Nsecs;
    }

    fn do_fake_ae(&mut self, settings: &CaptureSettings) -> Result<()> {
        let ae_raw = require_u8(settings, Tag::CONTROL_AE_MODE, "AE mode")?;
        match AeMode::try_from(ae_raw) {
            Ok(AeMode::Off) => {
                self.ae_mode = AeMode::Off;
                self.ae_state = AeState::Inactive;
                return Ok(());
            }
            Ok(AeMode::On) => self.ae_mode = AeMode::On,
            _ => {
                error!(target: "fakecam::3a", "Emulator doesn't support AE mode {}", ae_raw);
                return Err(CameraError::BadValue(format!("unsupported AE mode {}", ae_raw)));
            }
        }

        let ae_locked = require_u8(settings, Tag::CONTROL_AE_LOCK, "AE lock")? == u8::from(AeLock::On);

        let trigger_raw = settings.find_u8(Tag::CONTROL_AE_PRECAPTURE_TRIGGER);
        let precapture_trigger = trigger_raw == Some(u8::from(AePrecaptureTrigger::Start));
        if trigger_raw.is_some() {
            self.ae_trigger_id = settings.find_i32(Tag::CONTROL_AE_PRECAPTURE_ID).ok_or_else(|| {
                error!(target: "fakecam::3a", "When android.control.aePrecaptureTrigger is present in the request, android.control.aePrecaptureId needs to be present as well");
                CameraError::BadValue("AE precapture trigger without precapture id".into())
            })?;
        }

        if precapture_trigger || self.ae_state == AeState::Precapture {
            // 刚进入预捕获时重新计数
            if self.ae_state != AeState::Precapture {
                self.ae_counter = 0;
            }
            self.ae_target_exposure_time = self.target_exposure();

            let diff = self.ae_target_exposure_time - self.ae_current_exposure_time;
            if self.ae_counter > PRECAPTURE_MIN_FRAMES && diff < self.ae_target_exposure_time / 10 {
                self.ae_counter = 0;
                self.ae_state = if ae_locked {
                    AeState::Locked
                } else {
                    AeState::Converged
                };
            } else {
                self.track_exposure();
                self.ae_counter += 1;
                self.ae_state = AeState::Precapture;
            }
        } else if !ae_locked {
            match self.ae_state {
                AeState::Converged | AeState::Inactive => {
                    self.ae_counter += 1;
                    if self.ae_counter > STABLE_AE_MAX_FRAMES {
                        let step: f32 = self
                            .rng
                            .gen_range(EXPOSURE_WANDER_MIN..=EXPOSURE_WANDER_MAX);
                        let base = self.target_exposure() as f64;
                        self.ae_target_exposure_time = (base * 2f64.powf(step as f64)) as Nsecs;
                        self.ae_state = AeState::Searching;
                    }
                }
                AeState::Searching => {
                    self.track_exposure();
                    let diff = self.ae_target_exposure_time - self.ae_current_exposure_time;
                    if diff.abs() < self.ae_target_exposure_time / 10 {
                        self.ae_state = AeState::Converged;
                        self.ae_counter = 0;
                    }
                }
                AeState::Locked => {
                    self.ae_state = AeState::Converged;
                    self.ae_counter = 0;
                }
                other => {
                    error!(target: "fakecam::3a", "In unexpected AE state {:?}", other);
                    return Err(CameraError::InvalidOperation(format!(
                        "unexpected AE state {:?}",
                        other
                    )));
                }
            }
        } else {
            self.ae_state = AeState::Locked;
        }

        Ok(())
    }

    fn do_fake_af(&mut self, settings: &CaptureSettings) -> Result<()> {
        let af_raw = require_u8(settings, Tag::CONTROL_AF_MODE, "AF mode")?;

        let trigger_raw = match settings.find_u8(Tag::CONTROL_AF_TRIGGER) {
            Some(raw) => {
                self.af_trigger_id = settings.find_i32(Tag::CONTROL_AF_TRIGGER_ID).ok_or_else(|| {
                    error!(target: "fakecam::3a", "When android.control.afTrigger is present in the request, android.control.afTriggerId needs to be present as well");
                    CameraError::BadValue("AF trigger without trigger id".into())
                })?;
                raw
            }
            None => u8::from(AfTrigger::Idle),
        };

        let af_mode = match AfMode::try_from(af_raw) {
            // 关闭时不记录模式，下次重新打开时按原模式比较
            Ok(AfMode::Off) => {
                self.af_state = AfState::Inactive;
                return Ok(());
            }
            Ok(mode @ (AfMode::Auto | AfMode::Macro | AfMode::ContinuousVideo | AfMode::ContinuousPicture)) => {
                if !self.facing_back {
                    error!(target: "fakecam::3a", "Front camera doesn't support AF mode {:?}", mode);
                    return Err(CameraError::BadValue(format!(
                        "front camera doesn't support AF mode {:?}",
                        mode
                    )));
                }
                mode
            }
            _ => {
                error!(target: "fakecam::3a", "Emulator doesn't support AF mode {}", af_raw);
                return Err(CameraError::BadValue(format!("unsupported AF mode {}", af_raw)));
            }
        };

        let mode_changed = self.af_mode != af_mode;
        self.af_mode = af_mode;

        let start = match AfTrigger::try_from(trigger_raw) {
            Ok(AfTrigger::Idle) => false,
            Ok(AfTrigger::Start) => true,
            Ok(AfTrigger::Cancel) => {
                self.af_state = AfState::Inactive;
                return Ok(());
            }
            Err(raw) => {
                error!(target: "fakecam::3a", "Unknown AF trigger value {}", raw);
                return Err(CameraError::BadValue(format!("unknown AF trigger {}", raw)));
            }
        };

        let previous = self.af_state;
        self.af_state = match previous {
            AfState::Inactive => {
                if start {
                    if af_mode.is_single_shot() {
                        AfState::ActiveScan
                    } else {
                        AfState::NotFocusedLocked
                    }
                } else if !mode_changed && af_mode.is_continuous() {
                    AfState::PassiveScan
                } else {
                    AfState::Inactive
                }
            }
            AfState::PassiveScan => {
                if start {
                    self.random_focus_lock()
                } else if self.rng.gen_range(0..3) == 0 {
                    AfState::PassiveFocused
                } else {
                    AfState::PassiveScan
                }
            }
            AfState::PassiveFocused => {
                if start {
                    self.random_focus_lock()
                } else {
                    AfState::PassiveFocused
                }
            }
            AfState::ActiveScan => self.random_focus_lock(),
            AfState::FocusedLocked | AfState::NotFocusedLocked => {
                if start && af_mode.is_single_shot() {
                    AfState::ActiveScan
                } else {
                    previous
                }
            }
        };

        if previous != self.af_state {
            trace!(target: "fakecam::3a", "AF state {:?} -> {:?}", previous, self.af_state);
        }
        Ok(())
    }

    /// 2/3 概率对焦成功
    fn random_focus_lock(&mut self) -> AfState {
        if self.rng.gen_range(0..3) != 0 {
            AfState::FocusedLocked
        } else {
            AfState::NotFocusedLocked
        }
    }

    fn do_fake_awb(&mut self, settings: &CaptureSettings) -> Result<()> {
        let awb_raw = require_u8(settings, Tag::CONTROL_AWB_MODE, "AWB mode")?;
        match AwbMode::try_from(awb_raw) {
            Ok(AwbMode::Off) => {
                self.awb_mode = AwbMode::Off;
                self.awb_state = AwbState::Inactive;
                Ok(())
            }
            Ok(
                mode @ (AwbMode::Auto
                | AwbMode::Incandescent
                | AwbMode::Fluorescent
                | AwbMode::Daylight
                | AwbMode::Shade),
            ) => {
                // 模拟器不做白平衡，状态保持不变
                self.awb_mode = mode;
                Ok(())
            }
            _ => {
                error!(target: "fakecam::3a", "Emulator doesn't support AWB mode {}", awb_raw);
                Err(CameraError::BadValue(format!("unsupported AWB mode {}", awb_raw)))
            }
        }
    }

    fn update(&self, settings: &mut CaptureSettings) {
        if self.ae_state != AeState::Inactive {
            settings.update(Tag::SENSOR_EXPOSURE_TIME, self.ae_current_exposure_time);
            settings.update(Tag::SENSOR_SENSITIVITY, self.ae_current_sensitivity);
        }
        settings.update(Tag::CONTROL_AE_STATE, u8::from(self.ae_state));
        settings.update(Tag::CONTROL_AF_STATE, u8::from(self.af_state));
        settings.update(Tag::CONTROL_AWB_STATE, u8::from(self.awb_state));
        settings.update(Tag::CONTROL_AE_PRECAPTURE_ID, self.ae_trigger_id);
        settings.update(Tag::CONTROL_AF_TRIGGER_ID, self.af_trigger_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auto_settings() -> CaptureSettings {
        CaptureSettings::new()
            .with(Tag::CONTROL_MODE, u8::from(ControlMode::Auto))
            .with(Tag::CONTROL_SCENE_MODE, u8::from(SceneMode::FacePriority))
            .with(Tag::CONTROL_AE_MODE, u8::from(AeMode::On))
            .with(Tag::CONTROL_AE_LOCK, u8::from(AeLock::Off))
            .with(Tag::CONTROL_AF_MODE, u8::from(AfMode::Auto))
            .with(Tag::CONTROL_AWB_MODE, u8::from(AwbMode::Auto))
    }

    fn run(ctl: &mut Fake3A, settings: &CaptureSettings) -> Result<CaptureSettings> {
        let mut s = settings.clone();
        ctl.process(&mut s)?;
        Ok(s)
    }

    #[test]
    fn control_off_forces_everything_inactive() {
        let mut ctl = Fake3A::new(true, Some(1));
        ctl.ae_state = AeState::Searching;
        ctl.af_state = AfState::FocusedLocked;

        let mut s = auto_settings();
        s.update(Tag::CONTROL_MODE, u8::from(ControlMode::Off));
        let out = run(&mut ctl, &s).unwrap();

        assert_eq!(out.find_u8(Tag::CONTROL_AE_STATE), Some(AeState::Inactive as u8));
        assert_eq!(out.find_u8(Tag::CONTROL_AF_STATE), Some(AfState::Inactive as u8));
        assert_eq!(out.find_u8(Tag::CONTROL_AWB_STATE), Some(AwbState::Inactive as u8));
        assert!(!out.contains(Tag::SENSOR_EXPOSURE_TIME));
    }

    #[test]
    fn missing_control_or_scene_mode_is_bad_value() {
        let mut ctl = Fake3A::new(true, Some(1));
        let mut s = auto_settings();
        s.erase(Tag::CONTROL_SCENE_MODE);
        assert!(run(&mut ctl, &s).unwrap_err().is_bad_value());

        let mut s = auto_settings();
        s.erase(Tag::CONTROL_MODE);
        assert!(run(&mut ctl, &s).unwrap_err().is_bad_value());
    }

    #[test]
    fn only_face_priority_scene_is_supported() {
        let mut ctl = Fake3A::new(true, Some(1));
        let mut s = auto_settings();
        s.update(Tag::CONTROL_MODE, u8::from(ControlMode::UseSceneMode));
        s.update(Tag::CONTROL_SCENE_MODE, u8::from(SceneMode::Night));
        assert!(run(&mut ctl, &s).unwrap_err().is_bad_value());

        s.update(Tag::CONTROL_SCENE_MODE, u8::from(SceneMode::FacePriority));
        run(&mut ctl, &s).unwrap();
        assert!(ctl.face_priority);
    }

    #[test]
    fn ae_lock_always_reports_locked() {
        let mut ctl = Fake3A::new(true, Some(7));
        ctl.ae_state = AeState::Converged;
        let mut s = auto_settings();
        s.update(Tag::CONTROL_AE_LOCK, u8::from(AeLock::On));

        for _ in 0..250 {
            let out = run(&mut ctl, &s).unwrap();
            assert_eq!(out.find_u8(Tag::CONTROL_AE_STATE), Some(AeState::Locked as u8));
        }
    }

    #[test]
    fn releasing_lock_goes_back_to_converged() {
        let mut ctl = Fake3A::new(true, Some(7));
        ctl.ae_state = AeState::Locked;
        run(&mut ctl, &auto_settings()).unwrap();
        assert_eq!(ctl.ae_state, AeState::Converged);
        assert_eq!(ctl.ae_counter, 0);
    }

    #[test]
    fn precapture_runs_minimum_frames_then_converges() {
        let mut ctl = Fake3A::new(true, Some(3));
        let trigger = auto_settings()
            .with(Tag::CONTROL_AE_PRECAPTURE_TRIGGER, u8::from(AePrecaptureTrigger::Start))
            .with(Tag::CONTROL_AE_PRECAPTURE_ID, 42i32);
        let follow = auto_settings();

        let out = run(&mut ctl, &trigger).unwrap();
        assert_eq!(out.find_u8(Tag::CONTROL_AE_STATE), Some(AeState::Precapture as u8));
        assert_eq!(out.find_i32(Tag::CONTROL_AE_PRECAPTURE_ID), Some(42));

        // 第 2..=11 帧仍在预捕获
        for _ in 0..PRECAPTURE_MIN_FRAMES {
            run(&mut ctl, &follow).unwrap();
            assert_eq!(ctl.ae_state, AeState::Precapture);
        }
        run(&mut ctl, &follow).unwrap();
        assert_eq!(ctl.ae_state, AeState::Converged);
    }

    #[test]
    fn precapture_with_face_priority_tracks_longer_exposure() {
        let mut ctl = Fake3A::new(true, Some(3));
        let mut trigger = auto_settings()
            .with(Tag::CONTROL_AE_PRECAPTURE_TRIGGER, u8::from(AePrecaptureTrigger::Start))
            .with(Tag::CONTROL_AE_PRECAPTURE_ID, 1i32);
        trigger.update(Tag::CONTROL_MODE, u8::from(ControlMode::UseSceneMode));
        let mut follow = auto_settings();
        follow.update(Tag::CONTROL_MODE, u8::from(ControlMode::UseSceneMode));

        run(&mut ctl, &trigger).unwrap();
        let mut frames = 1;
        while ctl.ae_state == AeState::Precapture {
            run(&mut ctl, &follow).unwrap();
            frames += 1;
            assert!(frames < 200, "precapture never finished");
        }
        assert_eq!(ctl.ae_state, AeState::Converged);
        let diff = FACE_PRIORITY_EXPOSURE_TIME - ctl.ae_current_exposure_time;
        assert!(diff < FACE_PRIORITY_EXPOSURE_TIME / 10);
    }

    #[test]
    fn precapture_finishing_under_lock_reports_locked() {
        let mut ctl = Fake3A::new(true, Some(3));
        let mut s = auto_settings()
            .with(Tag::CONTROL_AE_PRECAPTURE_TRIGGER, u8::from(AePrecaptureTrigger::Start))
            .with(Tag::CONTROL_AE_PRECAPTURE_ID, 5i32);
        s.update(Tag::CONTROL_AE_LOCK, u8::from(AeLock::On));
        run(&mut ctl, &s).unwrap();
        s.erase(Tag::CONTROL_AE_PRECAPTURE_TRIGGER);
        while ctl.ae_state == AeState::Precapture {
            run(&mut ctl, &s).unwrap();
        }
        assert_eq!(ctl.ae_state, AeState::Locked);
    }

    #[test]
    fn precapture_trigger_requires_id() {
        let mut ctl = Fake3A::new(true, Some(3));
        let s = auto_settings()
            .with(Tag::CONTROL_AE_PRECAPTURE_TRIGGER, u8::from(AePrecaptureTrigger::Start));
        assert!(run(&mut ctl, &s).unwrap_err().is_bad_value());
    }

    #[test]
    fn stable_exposure_eventually_wanders_and_reconverges() {
        let mut ctl = Fake3A::new(true, Some(11));
        let s = auto_settings();
        for _ in 0..STABLE_AE_MAX_FRAMES {
            run(&mut ctl, &s).unwrap();
            assert_eq!(ctl.ae_state, AeState::Inactive);
        }
        run(&mut ctl, &s).unwrap();
        assert_eq!(ctl.ae_state, AeState::Searching);

        let target = ctl.ae_target_exposure_time;
        assert!(target >= NORMAL_EXPOSURE_TIME / 4 && target <= NORMAL_EXPOSURE_TIME * 2);

        for _ in 0..100 {
            run(&mut ctl, &s).unwrap();
            if ctl.ae_state == AeState::Converged {
                return;
            }
        }
        panic!("AE never converged after wandering");
    }

    #[test]
    fn ae_off_leaves_exposure_to_the_request() {
        let mut ctl = Fake3A::new(true, Some(1));
        let mut s = auto_settings();
        s.update(Tag::CONTROL_AE_MODE, u8::from(AeMode::Off));
        let out = run(&mut ctl, &s).unwrap();
        assert_eq!(out.find_u8(Tag::CONTROL_AE_STATE), Some(AeState::Inactive as u8));
        assert!(!out.contains(Tag::SENSOR_EXPOSURE_TIME));

        s.update(Tag::CONTROL_AE_MODE, u8::from(AeMode::OnAutoFlash));
        assert!(run(&mut ctl, &s).unwrap_err().is_bad_value());
    }

    #[test]
    fn active_ae_writes_exposure_and_sensitivity() {
        let mut ctl = Fake3A::new(true, Some(1));
        ctl.ae_state = AeState::Converged;
        let out = run(&mut ctl, &auto_settings()).unwrap();
        assert_eq!(out.find_i64(Tag::SENSOR_EXPOSURE_TIME), Some(NORMAL_EXPOSURE_TIME));
        assert_eq!(out.find_i32(Tag::SENSOR_SENSITIVITY), Some(NORMAL_SENSITIVITY));
    }

    #[test]
    fn af_cancel_resets_from_every_state() {
        let states = [
            AfState::Inactive,
            AfState::PassiveScan,
            AfState::PassiveFocused,
            AfState::ActiveScan,
            AfState::FocusedLocked,
            AfState::NotFocusedLocked,
        ];
        let s = auto_settings()
            .with(Tag::CONTROL_AF_TRIGGER, u8::from(AfTrigger::Cancel))
            .with(Tag::CONTROL_AF_TRIGGER_ID, 9i32);
        for state in states {
            let mut ctl = Fake3A::new(true, Some(2));
            ctl.af_state = state;
            let out = run(&mut ctl, &s).unwrap();
            assert_eq!(out.find_u8(Tag::CONTROL_AF_STATE), Some(AfState::Inactive as u8));
            assert_eq!(out.find_i32(Tag::CONTROL_AF_TRIGGER_ID), Some(9));
        }
    }

    #[test]
    fn single_shot_af_scans_then_locks() {
        let mut ctl = Fake3A::new(true, Some(2));
        let start = auto_settings()
            .with(Tag::CONTROL_AF_TRIGGER, u8::from(AfTrigger::Start))
            .with(Tag::CONTROL_AF_TRIGGER_ID, 1i32);
        run(&mut ctl, &start).unwrap();
        assert_eq!(ctl.af_state, AfState::ActiveScan);

        run(&mut ctl, &auto_settings()).unwrap();
        assert!(matches!(ctl.af_state, AfState::FocusedLocked | AfState::NotFocusedLocked));

        // 再次触发重新扫描
        run(&mut ctl, &start).unwrap();
        assert_eq!(ctl.af_state, AfState::ActiveScan);
    }

    #[test]
    fn continuous_af_enters_passive_scan_once_mode_is_stable() {
        let mut ctl = Fake3A::new(true, Some(2));
        let mut s = auto_settings();
        s.update(Tag::CONTROL_AF_MODE, u8::from(AfMode::ContinuousPicture));

        // 模式刚切换的这一帧保持 Inactive
        run(&mut ctl, &s).unwrap();
        assert_eq!(ctl.af_state, AfState::Inactive);
        run(&mut ctl, &s).unwrap();
        assert_eq!(ctl.af_state, AfState::PassiveScan);

        let start = s
            .clone()
            .with(Tag::CONTROL_AF_TRIGGER, u8::from(AfTrigger::Start))
            .with(Tag::CONTROL_AF_TRIGGER_ID, 3i32);
        run(&mut ctl, &start).unwrap();
        let locked = ctl.af_state;
        assert!(matches!(locked, AfState::FocusedLocked | AfState::NotFocusedLocked));

        // 连续模式下锁定后忽略再次触发
        run(&mut ctl, &start).unwrap();
        assert_eq!(ctl.af_state, locked);
    }

    #[test]
    fn continuous_trigger_from_inactive_is_not_focused() {
        let mut ctl = Fake3A::new(true, Some(2));
        let s = auto_settings()
            .with(Tag::CONTROL_AF_MODE, u8::from(AfMode::ContinuousVideo))
            .with(Tag::CONTROL_AF_TRIGGER, u8::from(AfTrigger::Start))
            .with(Tag::CONTROL_AF_TRIGGER_ID, 3i32);
        run(&mut ctl, &s).unwrap();
        assert_eq!(ctl.af_state, AfState::NotFocusedLocked);
    }

    #[test]
    fn front_camera_rejects_focus_modes() {
        let mut ctl = Fake3A::new(false, Some(2));
        assert!(run(&mut ctl, &auto_settings()).unwrap_err().is_bad_value());

        let mut s = auto_settings();
        s.update(Tag::CONTROL_AF_MODE, u8::from(AfMode::Off));
        run(&mut ctl, &s).unwrap();
        assert_eq!(ctl.af_state, AfState::Inactive);
    }

    #[test]
    fn af_trigger_requires_id_and_known_mode() {
        let mut ctl = Fake3A::new(true, Some(2));
        let s = auto_settings().with(Tag::CONTROL_AF_TRIGGER, u8::from(AfTrigger::Start));
        assert!(run(&mut ctl, &s).unwrap_err().is_bad_value());

        let mut s = auto_settings();
        s.update(Tag::CONTROL_AF_MODE, u8::from(AfMode::Edof));
        assert!(run(&mut ctl, &s).unwrap_err().is_bad_value());
    }

    #[test]
    fn awb_accepts_listed_modes_only() {
        let mut ctl = Fake3A::new(true, Some(2));
        for mode in [AwbMode::Auto, AwbMode::Incandescent, AwbMode::Fluorescent, AwbMode::Daylight, AwbMode::Shade] {
            let mut s = auto_settings();
            s.update(Tag::CONTROL_AWB_MODE, u8::from(mode));
            run(&mut ctl, &s).unwrap();
        }
        let mut s = auto_settings();
        s.update(Tag::CONTROL_AWB_MODE, u8::from(AwbMode::Twilight));
        assert!(run(&mut ctl, &s).unwrap_err().is_bad_value());
    }

    #[test]
    fn same_seed_gives_same_focus_sequence() {
        let start = auto_settings()
            .with(Tag::CONTROL_AF_TRIGGER, u8::from(AfTrigger::Start))
            .with(Tag::CONTROL_AF_TRIGGER_ID, 1i32);
        let idle = auto_settings();
        let sequence = |seed| {
            let mut ctl = Fake3A::new(true, Some(seed));
            (0..20)
                .map(|i| {
                    let s = if i % 2 == 0 { &start } else { &idle };
                    run(&mut ctl, s).unwrap();
                    ctl.af_state
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(sequence(99), sequence(99));
    }
}
