//! Утилиты для подробного диагностического вывода.

use std::sync::OnceLock;

/// Возвращает `true`, если включена подробная диагностика.
///
/// Управляется переменной окружения `RECITE_DEBUG` (любое значение).
pub fn enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| std::env::var_os("RECITE_DEBUG").is_some())
}
