//! Logging configuration for cbox's C bindings.

use std::os::raw::{c_char, c_void};
use std::ptr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Once, RwLock};

use log::{Level, LevelFilter, Log, Metadata, Record};
use once_cell::sync::Lazy;

use crate::error::{Error, cbox_error_t, clear_error, cstring_from_str_lossy, write_error};
use crate::ffi::read_optional_cstr;

const LOGGER_STATE_UNINIT: u8 = 0;
const LOGGER_STATE_READY: u8 = 1;
const LOGGER_STATE_FAILED: u8 = 2;

static LOGGER_STATE: AtomicU8 = AtomicU8::new(LOGGER_STATE_UNINIT);
static LOGGER_INIT: Once = Once::new();
static CBOX_LOGGER: Lazy<CboxLogger> = Lazy::new(CboxLogger::new);

/// Log level values for cbox logging.
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(C)]
pub enum cbox_log_level_t {
    CBOX_LOG_LEVEL_OFF = 0,
    CBOX_LOG_LEVEL_ERROR = 1,
    CBOX_LOG_LEVEL_WARN = 2,
    CBOX_LOG_LEVEL_INFO = 3,
    CBOX_LOG_LEVEL_DEBUG = 4,
    CBOX_LOG_LEVEL_TRACE = 5,
}

impl From<cbox_log_level_t> for LevelFilter {
    fn from(value: cbox_log_level_t) -> Self {
        match value {
            cbox_log_level_t::CBOX_LOG_LEVEL_OFF => LevelFilter::Off,
            cbox_log_level_t::CBOX_LOG_LEVEL_ERROR => LevelFilter::Error,
            cbox_log_level_t::CBOX_LOG_LEVEL_WARN => LevelFilter::Warn,
            cbox_log_level_t::CBOX_LOG_LEVEL_INFO => LevelFilter::Info,
            cbox_log_level_t::CBOX_LOG_LEVEL_DEBUG => LevelFilter::Debug,
            cbox_log_level_t::CBOX_LOG_LEVEL_TRACE => LevelFilter::Trace,
        }
    }
}

impl From<Level> for cbox_log_level_t {
    fn from(value: Level) -> Self {
        match value {
            Level::Error => cbox_log_level_t::CBOX_LOG_LEVEL_ERROR,
            Level::Warn => cbox_log_level_t::CBOX_LOG_LEVEL_WARN,
            Level::Info => cbox_log_level_t::CBOX_LOG_LEVEL_INFO,
            Level::Debug => cbox_log_level_t::CBOX_LOG_LEVEL_DEBUG,
            Level::Trace => cbox_log_level_t::CBOX_LOG_LEVEL_TRACE,
        }
    }
}

/// Structured log record delivered to a C callback.
///
/// String pointers are only valid for the duration of the callback and must
/// not be retained. `module_path` and `file` may be null when unavailable.
/// `line` is 0 when unknown.
#[allow(non_camel_case_types)]
#[repr(C)]
pub struct cbox_log_record_t {
    pub level: cbox_log_level_t,
    pub target: *const c_char,
    pub message: *const c_char,
    pub module_path: *const c_char,
    pub file: *const c_char,
    pub line: u32,
}

/// Callback invoked for each log record emitted by cbox.
///
/// The callback may be invoked from any thread that emits a log record.
#[allow(non_camel_case_types)]
pub type cbox_log_callback_t =
    Option<extern "C" fn(record: *const cbox_log_record_t, user_data: *mut c_void)>;

/// Configuration for initializing cbox logging.
///
/// If `filter` is non-null, it is interpreted as an `RUST_LOG`-style filter
/// string and overrides `level`. If `filter` is null and `RUST_LOG` is set in
/// the environment, the environment value is used. Otherwise `level` is
/// applied to cbox's own logs. If `callback` is null, logs are written to
/// stderr. Otherwise they are delivered to the callback with `user_data`
/// forwarded unchanged.
#[allow(non_camel_case_types)]
#[repr(C)]
pub struct cbox_log_config_t {
    pub level: cbox_log_level_t,
    pub filter: *const c_char,
    pub callback: cbox_log_callback_t,
    pub user_data: *mut c_void,
}

#[derive(Clone)]
struct Directive {
    target: String,
    level: LevelFilter,
}

#[derive(Clone)]
struct LogFilter {
    default: LevelFilter,
    directives: Vec<Directive>,
}

impl LogFilter {
    fn default_for_level(level: LevelFilter) -> Self {
        Self {
            default: LevelFilter::Off,
            directives: vec![Directive {
                target: "cbox".to_string(),
                level,
            }],
        }
    }

    fn parse(spec: &str) -> Result<Self, String> {
        let mut default = LevelFilter::Off;
        let mut directives = Vec::new();

        for (index, raw) in spec.split(',').enumerate() {
            let directive = raw.trim();
            if directive.is_empty() {
                continue;
            }

            match directive.split_once('=') {
                Some((target, level_str)) => {
                    let target = target.trim();
                    let level_str = level_str.trim();
                    if target.is_empty() {
                        return Err(format!("empty log directive at position {index}"));
                    }
                    if level_str.is_empty() {
                        return Err(format!("missing log level for target `{target}`"));
                    }
                    let level = parse_level(level_str)
                        .ok_or_else(|| format!("invalid level `{level_str}`"))?;
                    directives.push(Directive {
                        target: target.to_string(),
                        level,
                    });
                }
                None => {
                    if let Some(level) = parse_level(directive) {
                        default = level;
                    } else {
                        directives.push(Directive {
                            target: directive.to_string(),
                            level: LevelFilter::Trace,
                        });
                    }
                }
            }
        }

        Ok(Self { default, directives })
    }

    // The longest matching target prefix decides the level.
    fn enabled(&self, metadata: &Metadata) -> bool {
        let target = metadata.target();
        let mut best_level = self.default;
        let mut best_len = 0usize;

        for directive in &self.directives {
            if target.starts_with(&directive.target) && directive.target.len() >= best_len {
                best_len = directive.target.len();
                best_level = directive.level;
            }
        }

        metadata.level().to_level_filter() <= best_level
    }

    fn max_level(&self) -> LevelFilter {
        let mut max_level = self.default;
        for directive in &self.directives {
            if directive.level > max_level {
                max_level = directive.level;
            }
        }
        max_level
    }
}

struct LoggerConfig {
    filter: LogFilter,
    callback: cbox_log_callback_t,
    user_data: usize,
}

struct CboxLogger {
    config: RwLock<LoggerConfig>,
}

impl CboxLogger {
    fn new() -> Self {
        Self {
            config: RwLock::new(LoggerConfig {
                filter: LogFilter::default_for_level(LevelFilter::Info),
                callback: None,
                user_data: 0,
            }),
        }
    }

    fn update(&self, config: LoggerConfig) {
        let mut guard = self.config.write().unwrap_or_else(|err| err.into_inner());
        *guard = config;
    }

    fn with_config<T>(&self, f: impl FnOnce(&LoggerConfig) -> T) -> T {
        let guard = self.config.read().unwrap_or_else(|err| err.into_inner());
        f(&guard)
    }
}

impl Log for CboxLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.with_config(|config| config.filter.enabled(metadata))
    }

    fn log(&self, record: &Record) {
        let (callback, user_data, enabled) = self.with_config(|config| {
            (
                config.callback,
                config.user_data,
                config.filter.enabled(record.metadata()),
            )
        });

        if !enabled {
            return;
        }

        if let Some(callback) = callback {
            let target = cstring_from_str_lossy(record.target());
            let message = cstring_from_str_lossy(&record.args().to_string());
            let module_path = record.module_path().map(cstring_from_str_lossy);
            let file = record.file().map(cstring_from_str_lossy);
            let record = cbox_log_record_t {
                level: record.level().into(),
                target: target.as_ptr(),
                message: message.as_ptr(),
                module_path: module_path
                    .as_ref()
                    .map_or(ptr::null(), |value| value.as_ptr()),
                file: file.as_ref().map_or(ptr::null(), |value| value.as_ptr()),
                line: record.line().unwrap_or(0),
            };
            callback(&record, user_data as *mut c_void);
        } else {
            eprintln!("{} {}: {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

fn parse_level(value: &str) -> Option<LevelFilter> {
    match value.trim().to_ascii_lowercase().as_str() {
        "off" => Some(LevelFilter::Off),
        "error" => Some(LevelFilter::Error),
        "warn" | "warning" => Some(LevelFilter::Warn),
        "info" => Some(LevelFilter::Info),
        "debug" => Some(LevelFilter::Debug),
        "trace" => Some(LevelFilter::Trace),
        _ => None,
    }
}

fn resolve_filter(config: Option<&cbox_log_config_t>) -> Result<LogFilter, String> {
    if let Some(config) = config {
        if let Some(filter) = read_optional_cstr(config.filter) {
            return LogFilter::parse(&filter)
                .map_err(|err| format!("invalid log filter `{filter}`: {err}"));
        }
    }

    if let Ok(filter) = std::env::var("RUST_LOG") {
        return LogFilter::parse(&filter)
            .map_err(|err| format!("invalid RUST_LOG value `{filter}`: {err}"));
    }

    let level = config
        .map(|config| config.level)
        .unwrap_or(cbox_log_level_t::CBOX_LOG_LEVEL_INFO);
    Ok(LogFilter::default_for_level(level.into()))
}

fn ensure_logger(out_error: *mut *mut cbox_error_t) -> bool {
    LOGGER_INIT.call_once(|| {
        if log::set_logger(&*CBOX_LOGGER).is_ok() {
            LOGGER_STATE.store(LOGGER_STATE_READY, Ordering::SeqCst);
        } else {
            LOGGER_STATE.store(LOGGER_STATE_FAILED, Ordering::SeqCst);
        }
    });

    match LOGGER_STATE.load(Ordering::SeqCst) {
        LOGGER_STATE_READY => true,
        LOGGER_STATE_FAILED => {
            write_error(
                out_error,
                Error::Internal("logging already initialized by another logger".into()),
            );
            false
        }
        _ => {
            write_error(
                out_error,
                Error::Internal("logging failed to initialize".into()),
            );
            false
        }
    }
}

/// Initializes default logging configuration values.
///
/// The defaults select INFO logging for cbox and use no callback.
#[unsafe(no_mangle)]
pub extern "C" fn cbox_log_config_init(config: *mut cbox_log_config_t) {
    if config.is_null() {
        return;
    }
    // Safety: caller provided a writable config pointer.
    unsafe {
        *config = cbox_log_config_t {
            level: cbox_log_level_t::CBOX_LOG_LEVEL_INFO,
            filter: ptr::null(),
            callback: None,
            user_data: ptr::null_mut(),
        };
    }
}

/// Initializes logging for cbox.
///
/// If `config` is null, defaults are used. This function may be called
/// multiple times to update the logging configuration after initialization.
#[unsafe(no_mangle)]
pub extern "C" fn cbox_log_init(
    config: *const cbox_log_config_t,
    out_error: *mut *mut cbox_error_t,
) -> bool {
    clear_error(out_error);

    // Safety: a non-null config must point to a readable cbox_log_config_t.
    let config = unsafe { config.as_ref() };
    let filter = match resolve_filter(config) {
        Ok(filter) => filter,
        Err(message) => {
            write_error(out_error, Error::InvalidArgument(message));
            return false;
        }
    };

    if !ensure_logger(out_error) {
        return false;
    }

    let callback = config.and_then(|config| config.callback);
    let user_data = config.map(|config| config.user_data as usize).unwrap_or(0);

    let max_level = filter.max_level();
    CBOX_LOGGER.update(LoggerConfig {
        filter,
        callback,
        user_data,
    });
    log::set_max_level(max_level);
    true
}
