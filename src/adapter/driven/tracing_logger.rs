use crate::domain::port::Logger;
use std::collections::HashMap;
use uuid::Uuid;

/// ログレベル
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// tracingによるログ実装
/// コンポーネント名・相関ID・コンテキストを構造化フィールドとして出力する
#[derive(Debug, Clone, Default)]
pub struct TracingLogger;

impl TracingLogger {
    pub fn new() -> Self {
        Self
    }

    fn emit(
        &self,
        level: LogLevel,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    ) {
        let correlation_id = correlation_id
            .map(|id| id.to_string())
            .unwrap_or_default();
        let context = format_context(context.as_ref());

        match level {
            LogLevel::Debug => tracing::debug!(
                component,
                correlation_id = %correlation_id,
                context = %context,
                "{}",
                message
            ),
            LogLevel::Info => tracing::info!(
                component,
                correlation_id = %correlation_id,
                context = %context,
                "{}",
                message
            ),
            LogLevel::Warning => tracing::warn!(
                component,
                correlation_id = %correlation_id,
                context = %context,
                "{}",
                message
            ),
            LogLevel::Error => tracing::error!(
                component,
                correlation_id = %correlation_id,
                context = %context,
                "{}",
                message
            ),
        }
    }
}

/// コンテキストをキー順の `key=value` 形式にまとめる
fn format_context(context: Option<&HashMap<String, String>>) -> String {
    let Some(context) = context else {
        return String::new();
    };
    let mut pairs: Vec<_> = context.iter().collect();
    pairs.sort_by(|a, b| a.0.cmp(b.0));
    pairs
        .into_iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join(", ")
}

impl Logger for TracingLogger {
    fn debug(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    ) {
        self.emit(LogLevel::Debug, component, message, correlation_id, context);
    }

    fn info(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    ) {
        self.emit(LogLevel::Info, component, message, correlation_id, context);
    }

    fn warn(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    ) {
        self.emit(LogLevel::Warning, component, message, correlation_id, context);
    }

    fn error(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    ) {
        self.emit(LogLevel::Error, component, message, correlation_id, context);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_context_is_sorted() {
        let mut context = HashMap::new();
        context.insert("product_id".to_string(), "1".to_string());
        context.insert("available".to_string(), "6".to_string());
        assert_eq!(format_context(Some(&context)), "available=6, product_id=1");
    }

    #[test]
    fn test_format_context_empty() {
        assert_eq!(format_context(None), "");
        assert_eq!(format_context(Some(&HashMap::new())), "");
    }

    #[test]
    fn test_all_levels_can_be_emitted_without_subscriber() {
        let logger = TracingLogger::new();
        let id = Some(Uuid::new_v4());
        logger.debug("Test", "debug", id, None);
        logger.info("Test", "info", id, None);
        logger.warn("Test", "warn", None, Some(HashMap::new()));
        logger.error("Test", "error", None, None);
    }
}
