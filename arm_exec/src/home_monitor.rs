//! # Home Position Monitor
//!
//! Persists whether the arm is at its home pose as the presence of a marker file, so that other
//! processes (and the next boot) can tell if the arm is parked. The marker is only updated while
//! the arm is running, a stopped arm's angles are not trusted.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::arm::{ArmStatus, NUM_JOINTS};
use log::{debug, info};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use crate::params::{deg_to_rad, ArmExecParams};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct HomeMonitor {
    marker_path: PathBuf,

    home_deg: [f64; NUM_JOINTS],

    tolerance_rad: f64,

    /// Home pose in radians, computed on first use
    home_rad: Option<[f64; NUM_JOINTS]>,

    /// Result of the previous evaluation
    last_at_home: Option<bool>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum HomeMonitorError {
    #[error("Could not create the home marker file {0:?}: {1}")]
    CreateMarker(PathBuf, io::Error),

    #[error("Could not remove the home marker file {0:?}: {1}")]
    RemoveMarker(PathBuf, io::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl HomeMonitor {
    pub fn new(params: &ArmExecParams) -> Self {
        Self {
            marker_path: params.home_marker_path(),
            home_deg: params.home_position_deg,
            tolerance_rad: params.home_tolerance_deg.to_radians(),
            home_rad: None,
            last_at_home: None,
        }
    }

    /// Evaluate the latest status and update the marker file.
    ///
    /// Returns `None` if the arm is not running, in which case the marker is left untouched.
    pub fn check(&mut self, status: &ArmStatus) -> Result<Option<bool>, HomeMonitorError> {
        if !status.is_running() {
            return Ok(None)
        }

        let home_deg = self.home_deg;
        let home_rad = *self.home_rad.get_or_insert_with(|| deg_to_rad(&home_deg));

        let at_home = status.joint_angles_rad
            .iter()
            .zip(home_rad.iter())
            .all(|(actual, home)| (actual - home).abs() <= self.tolerance_rad);

        if at_home {
            OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&self.marker_path)
                .map_err(|e| HomeMonitorError::CreateMarker(self.marker_path.clone(), e))?;
        }
        else {
            match fs::remove_file(&self.marker_path) {
                Ok(()) => debug!("Home marker removed"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => (),
                Err(e) => return Err(HomeMonitorError::RemoveMarker(self.marker_path.clone(), e))
            }
        }

        if self.last_at_home != Some(at_home) {
            match at_home {
                true => info!("Arm is at the home position"),
                false => info!("Arm is away from the home position"),
            }
        }
        self.last_at_home = Some(at_home);

        Ok(Some(at_home))
    }

    pub fn marker_path(&self) -> &Path {
        &self.marker_path
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::eqpt::arm::RobotMode;

    fn status(mode: RobotMode, angles_deg: [f64; NUM_JOINTS]) -> ArmStatus {
        ArmStatus {
            robot_mode: mode,
            joint_angles_rad: deg_to_rad(&angles_deg),
            ..Default::default()
        }
    }

    fn monitor(dir: &Path) -> HomeMonitor {
        HomeMonitor::new(&ArmExecParams {
            work_directory: dir.to_path_buf(),
            home_position_deg: [0.0, -90.0, 90.0, 0.0, 45.0, 0.0],
            home_tolerance_deg: 2.0,
            ..Default::default()
        })
    }

    #[test]
    fn test_marker_follows_status() {
        let dir = tempfile::tempdir().unwrap();
        let mut hm = monitor(dir.path());
        let marker = hm.marker_path().to_path_buf();

        // Within tolerance on every joint
        let near = [1.9, -91.5, 88.1, 0.0, 45.0, -1.0];
        assert_eq!(hm.check(&status(RobotMode::Running, near)).unwrap(), Some(true));
        assert!(marker.exists());

        // One joint out
        let far = [1.9, -91.5, 88.1, 0.0, 45.0, -2.5];
        assert_eq!(hm.check(&status(RobotMode::Running, far)).unwrap(), Some(false));
        assert!(!marker.exists());

        // Removing an absent marker is fine
        assert_eq!(hm.check(&status(RobotMode::Running, far)).unwrap(), Some(false));
        assert!(!marker.exists());
    }

    #[test]
    fn test_ignored_when_not_running() {
        let dir = tempfile::tempdir().unwrap();
        let mut hm = monitor(dir.path());
        let marker = hm.marker_path().to_path_buf();

        let home = [0.0, -90.0, 90.0, 0.0, 45.0, 0.0];
        hm.check(&status(RobotMode::Running, home)).unwrap();
        assert!(marker.exists());

        let far = [30.0, -90.0, 90.0, 0.0, 45.0, 0.0];
        assert_eq!(hm.check(&status(RobotMode::SecurityStopped, far)).unwrap(), None);
        assert!(marker.exists());
    }

    #[test]
    fn test_truncates_existing_marker() {
        let dir = tempfile::tempdir().unwrap();
        let mut hm = monitor(dir.path());
        fs::write(hm.marker_path(), b"stale").unwrap();

        let home = [0.0, -90.0, 90.0, 0.0, 45.0, 0.0];
        hm.check(&status(RobotMode::Running, home)).unwrap();

        assert_eq!(fs::read(hm.marker_path()).unwrap().len(), 0);
    }

    #[test]
    fn test_missing_work_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut hm = monitor(&dir.path().join("gone"));

        let home = [0.0, -90.0, 90.0, 0.0, 45.0, 0.0];
        assert!(matches!(
            hm.check(&status(RobotMode::Running, home)),
            Err(HomeMonitorError::CreateMarker(..))
        ));
    }
}
