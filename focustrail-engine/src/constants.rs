//! Centralized tuning constants for the journey engine.
//!
//! These values define the deterministic math for converting focus time into
//! travel distance. Keeping them together ensures progression can only be
//! adjusted via code changes reviewed in version control, rather than through
//! external assets.

// Logging keys -------------------------------------------------------------
pub(crate) const LOG_TRAVELED: &str = "log.traveled";
pub(crate) const LOG_ARRIVED: &str = "log.arrived";
pub(crate) const LOG_NO_PATH: &str = "log.no-path";

// Distance conversion ------------------------------------------------------
/// Fixed system-wide conversion rate from focus minutes to kilometers.
/// Equivalent to a walking-ish 15 km/h; not user-configurable.
pub const KM_PER_MINUTE: f64 = 0.25;
pub(crate) const SECONDS_PER_MINUTE: f64 = 60.0;
pub(crate) const MILLIS_PER_SECOND: f64 = 1_000.0;

// Focus presets ------------------------------------------------------------
/// Preset focus durations offered to the user, in minutes. A session may also
/// run unbounded ("free mode") by starting without a preset.
pub const PRESET_MINUTES: [u32; 4] = [15, 25, 45, 60];
