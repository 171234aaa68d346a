//! Application constants for the water-temperature QAQC tool
//!
//! Default thresholds, column names, timestamp formats and project folder
//! layout used throughout the crate.

// =============================================================================
// Grid and Rolling Windows
// =============================================================================

/// Default grid interval in minutes
pub const DEFAULT_INTERVAL_MINUTES: i64 = 15;

/// Rolling mean window (readings) for the trailing and leading passes
pub const ROLLING_MEAN_WINDOW: usize = 5;

/// Rolling standard deviation window (readings)
pub const ROLLING_STDEV_WINDOW: usize = 2;

// =============================================================================
// Quality Control Thresholds
// =============================================================================

/// Default flagging thresholds, all in degrees Celsius except the stdev
pub mod thresholds {
    /// Immediate reading-to-reading change that counts as a spike
    pub const SPIKE_ABS: f64 = 0.8;

    /// Deviation from a rolling mean that counts as a spike
    pub const ROLLING_DIFF: f64 = 1.5;

    /// Rolling standard deviation that counts as a spike
    pub const ROLLING_STDEV: f64 = 2.0;

    /// Lowest physically plausible temperature
    pub const MIN_TEMP: f64 = -20.0;

    /// Highest physically plausible temperature
    pub const MAX_TEMP: f64 = 50.0;

    /// Warning threshold for unusually warm water
    pub const HIGH_TEMP: f64 = 35.0;

    /// Daily max-min range above which the logger is assumed out of water
    pub const DIURNAL_RANGE: f64 = 10.0;

    /// Freezing point used for the below-ice rule
    pub const ICE_POINT: f64 = 0.0;
}

// =============================================================================
// Columns and Sentinels
// =============================================================================

/// Standard column names of formatted and tidy files
pub mod columns {
    pub const DATA_ID: &str = "data_id";
    pub const STATION_CODE: &str = "station_code";
    pub const TIMESTAMP: &str = "timestamp";
    pub const UTC_OFFSET: &str = "utc_offset";
    pub const LOGGER_SERIAL: &str = "logger_serial";
    pub const WTMP: &str = "wtmp";
    pub const WTMP_FLAG: &str = "wtmp_flag";

    /// Column order of a tidy file
    pub const TIDY_ORDER: &[&str] = &[
        DATA_ID,
        STATION_CODE,
        TIMESTAMP,
        UTC_OFFSET,
        LOGGER_SERIAL,
        WTMP,
        WTMP_FLAG,
    ];
}

/// Literal written in place of a missing temperature
pub const MISSING_SENTINEL: &str = "NAN";

/// Cell values read back as a missing temperature
pub const MISSING_TOKENS: &[&str] = &["", "NAN", "NaN", "nan", "NA", "null"];

/// Raw logger rows containing this marker (any column) are event rows
pub const LOGGED_EVENT_MARKER: &str = "logged";

// =============================================================================
// Timestamp Formats
// =============================================================================

/// Strict formats tried column-wide, in priority order
///
/// `%Y` formats only match a four-digit year field, so `24-08-14` falls
/// through to `%y`.
pub const STRICT_TIMESTAMP_FORMATS: &[&str] = &["%y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Per-value fallback formats once no strict format fits the whole column
pub const FALLBACK_TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%y %H:%M:%S",
    "%m/%d/%y %H:%M",
    "%m/%d/%y %I:%M:%S %p",
    "%m/%d/%y %I:%M %p",
];

/// Date-only fallbacks (midnight)
pub const FALLBACK_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%m/%d/%y"];

/// Format used when writing timestamps
pub const TIDY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Formats accepted for visit window bounds
pub const VISIT_TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S"];

// =============================================================================
// Visit Window Defaults
// =============================================================================

/// Default current visit length ending at the last logged reading
pub const DEFAULT_VISIT_MINUTES: i64 = 60;

/// Previous visit auto-fill: start this long before the historical boundary
pub const PREVIOUS_VISIT_LEAD_MINUTES: i64 = 60;

/// Previous visit auto-fill: window length
pub const PREVIOUS_VISIT_LENGTH_MINUTES: i64 = 105;

// =============================================================================
// Project Layout and File Naming
// =============================================================================

/// Tidy (flagged) files, relative to the project directory
pub const TIDY_SUBFOLDER: &str = "01_Data/02_Tidy";

/// Compiled annual records, relative to the project directory
pub const COMPILED_SUBFOLDER: &str = "01_Data/03_Compiled";

/// Infix separating station code from the rest of a tidy file name
pub const TIDY_NAME_INFIX: &str = "_tidy_";

/// Infix separating station code from the rest of a raw file name
pub const RAW_NAME_INFIX: &str = "_raw_";

/// Infix of compiled annual file names `{station}_compiled_{year}`
pub const COMPILED_NAME_INFIX: &str = "_compiled_";

/// Date stamp placeholder for tidy files without one
pub const UNDATED_FILE_KEY: &str = "00000000";

/// Date stamp format embedded in tidy file names
pub const FILE_DATE_FORMAT: &str = "%Y%m%d";

/// Default leading rows to skip in raw logger exports (plot title line)
pub const DEFAULT_RAW_SKIP_ROWS: usize = 1;
