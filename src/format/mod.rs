//! Message interpolation, timestamps and record formatting

pub mod formatter;
pub mod interpolator;
pub mod timestamp;

pub use formatter::{Formatter, DEFAULT_BRACE_FORMAT, DEFAULT_FORMAT};
pub use interpolator::{interpolate_brace, interpolate_percent, InterpolatorKind};
pub use timestamp::{render_strftime, TimestampFormat};
