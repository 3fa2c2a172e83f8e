//! Run configuration – reads/writes `~/.rover/config.toml`.
//!
//! Every section deserializes with per-field defaults, so a file only needs
//! the values it changes:
//!
//! ```toml
//! [geometry]
//! check_radius = 1.5
//!
//! [control]
//! cadence_hz = 5.0
//! oracle = "uniform"
//!
//! [sim]
//! scenario = "corridor"
//! ```
//!
//! A handful of `ROVER_*` environment variables override the file.

use std::fs;
use std::path::{Path, PathBuf};

use rover_hal::sim::{Scenario, VehicleParams};
use rover_kernel::BreakerConfig;
use rover_perception::tracker::TrackerConfig;
use rover_runtime::{ExplorerConfig, SectorScorer, UniformScorer, VisitGridScorer};
use rover_types::{Geometry, PlannerTuning, RoverError, SensorCalibration};
use serde::{Deserialize, Serialize};

pub const ENV_CADENCE_HZ: &str = "ROVER_CADENCE_HZ";
pub const ENV_CHECK_RADIUS: &str = "ROVER_CHECK_RADIUS";
pub const ENV_STOP_DISTANCE: &str = "ROVER_STOP_DISTANCE";
pub const ENV_SCENARIO: &str = "ROVER_SCENARIO";
pub const ENV_TRACE_PATH: &str = "ROVER_TRACE_PATH";

// ─────────────────────────────────────────────────────────────────────────────
// Sections
// ─────────────────────────────────────────────────────────────────────────────

/// Which sector oracle the explorer consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OracleKind {
    /// Every sector weighs the same; only clearance and continuity matter.
    Uniform,
    /// Prefer sectors heading into less visited grid cells.
    #[default]
    VisitGrid,
}

impl std::fmt::Display for OracleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OracleKind::Uniform => write!(f, "uniform"),
            OracleKind::VisitGrid => write!(f, "visit_grid"),
        }
    }
}

/// `[control]` – loop rates, interlocks and the oracle choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Decision rate of the control loop (Hz).
    pub cadence_hz: f32,
    /// Rate of the motion tracker task (Hz).
    pub tracker_hz: f32,
    pub oracle: OracleKind,
    /// Visit grid cell edge (metres).
    pub grid_cell: f32,
    /// How far ahead of the body centre a sector is projected on the grid.
    pub grid_look_ahead: f32,
    /// Record a per-tick trace.
    pub trace: bool,
    /// Where to write the trace when the run ends.  Implies `trace`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_path: Option<PathBuf>,
    pub oracle_breaker: BreakerConfig,
    pub actuator_breaker: BreakerConfig,
    pub tracker: TrackerConfig,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            cadence_hz: 4.0,
            tracker_hz: 50.0,
            oracle: OracleKind::default(),
            grid_cell: 0.5,
            grid_look_ahead: 1.0,
            trace: false,
            trace_path: None,
            oracle_breaker: BreakerConfig::default(),
            actuator_breaker: BreakerConfig::default(),
            tracker: TrackerConfig::default(),
        }
    }
}

/// `[sim]` – the simulated world and vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub scenario: Scenario,
    /// Edge length of the arena, or length of the corridor (metres).
    pub size: f32,
    /// Physics step rate (Hz).
    pub physics_hz: f32,
    pub vehicle: VehicleParams,
    pub calibration: SensorCalibration,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            scenario: Scenario::default(),
            size: 6.0,
            physics_hz: 50.0,
            vehicle: VehicleParams::default(),
            calibration: SensorCalibration::default(),
        }
    }
}

/// Persisted configuration stored in `~/.rover/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoverConfig {
    pub geometry: Geometry,
    pub tuning: PlannerTuning,
    pub control: ControlConfig,
    pub sim: SimConfig,
}

impl RoverConfig {
    /// The slice of the configuration the control loop needs.
    pub fn explorer_config(&self) -> ExplorerConfig {
        ExplorerConfig {
            geometry: self.geometry,
            tuning: self.tuning,
            cadence_hz: self.control.cadence_hz,
            oracle_breaker: self.control.oracle_breaker,
            actuator_breaker: self.control.actuator_breaker,
            record_trace: self.control.trace || self.control.trace_path.is_some(),
        }
    }

    /// Build the configured sector oracle.
    pub fn scorer(&self) -> Box<dyn SectorScorer> {
        match self.control.oracle {
            OracleKind::Uniform => Box::new(UniformScorer::default()),
            OracleKind::VisitGrid => Box::new(VisitGridScorer::new(
                self.control.grid_cell,
                self.control.grid_look_ahead,
            )),
        }
    }

    /// # Errors
    ///
    /// [`RoverError::Config`] naming the first unusable value.
    pub fn validate(&self) -> Result<(), RoverError> {
        self.explorer_config().validate()?;
        positive("control.tracker_hz", self.control.tracker_hz)?;
        positive("control.grid_cell", self.control.grid_cell)?;
        positive("control.grid_look_ahead", self.control.grid_look_ahead)?;
        positive("sim.size", self.sim.size)?;
        positive("sim.physics_hz", self.sim.physics_hz)?;
        Ok(())
    }
}

fn positive(name: &str, value: f32) -> Result<(), RoverError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(RoverError::Config(format!("{name} must be positive, got {value}")))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Paths
// ─────────────────────────────────────────────────────────────────────────────

/// Default config location, or `None` when no home directory is known.
pub fn config_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .ok()
        .map(|home| config_path_for_home(&home))
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".rover").join("config.toml")
}

// ─────────────────────────────────────────────────────────────────────────────
// Load / save
// ─────────────────────────────────────────────────────────────────────────────

/// Read a config file.  `Ok(None)` if it does not exist.
pub fn load_from(path: &Path) -> Result<Option<RoverConfig>, RoverError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)?;
    let cfg = toml::from_str(&raw).map_err(|e| {
        RoverError::Config(format!("failed to parse {}: {e}", path.display()))
    })?;
    Ok(Some(cfg))
}

/// Resolve the configuration for a run.
///
/// An explicit path must exist.  Without one, the default location is used
/// when present and built-in defaults otherwise.  Environment overrides are
/// applied last and the result is validated.  Returns the file actually read
/// alongside the config.
pub fn resolve(explicit: Option<&Path>) -> Result<(RoverConfig, Option<PathBuf>), RoverError> {
    let (cfg, source) = match explicit {
        Some(path) => match load_from(path)? {
            Some(cfg) => (cfg, Some(path.to_path_buf())),
            None => {
                return Err(RoverError::Config(format!(
                    "config file {} not found",
                    path.display()
                )));
            }
        },
        None => match config_path() {
            Some(path) => match load_from(&path)? {
                Some(cfg) => (cfg, Some(path)),
                None => (RoverConfig::default(), None),
            },
            None => (RoverConfig::default(), None),
        },
    };

    let mut cfg = cfg;
    apply_env_overrides(&mut cfg);
    cfg.validate()?;
    Ok((cfg, source))
}

/// Apply `ROVER_*` overrides from the process environment.
pub fn apply_env_overrides(cfg: &mut RoverConfig) {
    apply_overrides_from(cfg, |key| std::env::var(key).ok());
}

/// Apply overrides looked up through `var`.  Unparseable values are ignored.
pub(crate) fn apply_overrides_from(cfg: &mut RoverConfig, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var(ENV_CADENCE_HZ)
        && let Ok(hz) = v.parse::<f32>()
    {
        cfg.control.cadence_hz = hz;
    }
    if let Some(v) = var(ENV_CHECK_RADIUS)
        && let Ok(radius) = v.parse::<f32>()
    {
        cfg.geometry.check_radius = radius;
    }
    if let Some(v) = var(ENV_STOP_DISTANCE)
        && let Ok(distance) = v.parse::<f32>()
    {
        cfg.geometry.stop_distance = distance;
    }
    if let Some(v) = var(ENV_SCENARIO)
        && let Ok(scenario) = Scenario::deserialize(toml::Value::String(v))
    {
        cfg.sim.scenario = scenario;
    }
    if let Some(v) = var(ENV_TRACE_PATH)
        && !v.is_empty()
    {
        cfg.control.trace_path = Some(PathBuf::from(v));
    }
}

/// Save the config to `path`, creating parent directories as needed.
pub fn save_to(cfg: &RoverConfig, path: &Path) -> Result<(), RoverError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
        // Owner only (rwx------) on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))?;
        }
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| RoverError::Serialization(format!("failed to serialize config: {e}")))?;
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)?;
        file.write_all(raw.as_bytes())?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn config_path_for_home_returns_expected_path() {
        let path = config_path_for_home("/home/rover");
        assert_eq!(path, PathBuf::from("/home/rover/.rover/config.toml"));
    }

    #[test]
    fn defaults_are_valid() {
        let cfg = RoverConfig::default();
        cfg.validate().unwrap();
        let explorer = cfg.explorer_config();
        assert_eq!(explorer.cadence_hz, 4.0);
        assert!(!explorer.record_trace);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let cfg: RoverConfig = toml::from_str(
            r#"
            [geometry]
            check_radius = 1.5

            [control]
            oracle = "uniform"

            [control.oracle_breaker]
            failure_threshold = 5

            [sim]
            scenario = "corridor"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.geometry.check_radius, 1.5);
        assert_eq!(cfg.geometry.turn_diameter, Geometry::default().turn_diameter);
        assert_eq!(cfg.control.oracle, OracleKind::Uniform);
        assert_eq!(cfg.control.oracle_breaker.failure_threshold, 5);
        assert_eq!(cfg.control.oracle_breaker.cooldown_ticks, 8);
        assert_eq!(cfg.sim.scenario, Scenario::Corridor);
        assert_eq!(cfg.tuning, PlannerTuning::default());
    }

    #[test]
    fn trace_path_enables_recording() {
        let mut cfg = RoverConfig::default();
        cfg.control.trace_path = Some(PathBuf::from("run.json"));
        assert!(cfg.explorer_config().record_trace);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_path_for_home(&dir.path().to_string_lossy());

        let mut cfg = RoverConfig::default();
        cfg.control.cadence_hz = 8.0;
        cfg.control.trace_path = Some(PathBuf::from("/tmp/trace.json"));
        cfg.sim.scenario = Scenario::Empty;
        save_to(&cfg, &path).unwrap();

        let back = load_from(&path).unwrap().unwrap();
        assert_eq!(back, cfg);
    }

    #[test]
    fn load_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_from(&dir.path().join("nope.toml")).unwrap().is_none());
    }

    #[test]
    fn load_malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[control]\ncadence_hz = \"fast\"\n").unwrap();
        let err = load_from(&path).unwrap_err();
        assert!(matches!(err, RoverError::Config(_)));
    }

    #[test]
    fn resolve_rejects_missing_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, RoverError::Config(_)));
    }

    #[test]
    fn resolve_validates_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[sim]\nphysics_hz = 0.0\n").unwrap();
        let err = resolve(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("sim.physics_hz"));
    }

    #[test]
    fn resolve_rejects_nan_geometry_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        for field in ["fear_margin", "center_offset", "inner_offset"] {
            fs::write(&path, format!("[geometry]\n{field} = nan\n")).unwrap();
            let err = resolve(Some(&path)).unwrap_err();
            assert!(err.to_string().contains(field), "{field}: {err}");
        }
    }

    #[test]
    fn resolve_reports_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        save_to(&RoverConfig::default(), &path).unwrap();
        let (_, source) = resolve(Some(&path)).unwrap();
        assert_eq!(source.as_deref(), Some(path.as_path()));
    }

    #[cfg(unix)]
    #[test]
    fn config_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = config_path_for_home(&dir.path().to_string_lossy());
        save_to(&RoverConfig::default(), &path).unwrap();

        let file_mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);
        let dir_mode = fs::metadata(path.parent().unwrap()).unwrap().permissions().mode() & 0o777;
        assert_eq!(dir_mode, 0o700);
    }

    #[test]
    fn overrides_apply_parsed_values() {
        let mut cfg = RoverConfig::default();
        apply_overrides_from(
            &mut cfg,
            env(&[
                (ENV_CADENCE_HZ, "10"),
                (ENV_CHECK_RADIUS, "1.25"),
                (ENV_STOP_DISTANCE, "0.4"),
                (ENV_SCENARIO, "corridor"),
                (ENV_TRACE_PATH, "out/trace.json"),
            ]),
        );
        assert_eq!(cfg.control.cadence_hz, 10.0);
        assert_eq!(cfg.geometry.check_radius, 1.25);
        assert_eq!(cfg.geometry.stop_distance, 0.4);
        assert_eq!(cfg.sim.scenario, Scenario::Corridor);
        assert_eq!(cfg.control.trace_path, Some(PathBuf::from("out/trace.json")));
    }

    #[test]
    fn overrides_ignore_invalid_values() {
        let mut cfg = RoverConfig::default();
        apply_overrides_from(
            &mut cfg,
            env(&[
                (ENV_CADENCE_HZ, "fast"),
                (ENV_SCENARIO, "moon"),
                (ENV_TRACE_PATH, ""),
            ]),
        );
        assert_eq!(cfg, RoverConfig::default());
    }

    #[test]
    fn scorer_follows_oracle_kind() {
        let mut cfg = RoverConfig::default();
        cfg.control.oracle = OracleKind::Uniform;
        let scorer = cfg.scorer();
        let weights = scorer
            .score_sectors(
                rover_types::Pose::default(),
                &rover_runtime::ScoringGeometry::from_geometry(&cfg.geometry),
            )
            .unwrap();
        assert!(weights.iter().all(|(_, w)| *w == 1.0));
    }
}
