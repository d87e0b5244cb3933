//! Request and response models for the REST API.

use crate::governance::{CacheHealth, HealthStatus, LiveEvent};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Chart metadata accompanying an analysis request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ChartMetadata {
    /// Instrument symbol (e.g., "BTCUSD").
    #[serde(default)]
    pub symbol: Option<String>,
    /// Chart timeframe (e.g., "4h", "1d").
    #[serde(default)]
    pub timeframe: Option<String>,
    /// Indicators visible on the chart.
    #[serde(default)]
    pub indicators: Vec<String>,
}

/// Chart analysis request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnalyzeRequest {
    /// Analysis prompt for the AI provider.
    pub prompt: String,
    /// Base64-encoded chart image (PNG, JPEG or WebP).
    pub image_base64: String,
    /// Optional chart metadata.
    #[serde(default)]
    pub chart: ChartMetadata,
}

/// Chart analysis response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnalyzeResponse {
    /// Provider analysis payload.
    pub analysis: Value,
    /// Whether the result was served from the response cache.
    pub cached: bool,
    /// Fingerprint the result is cached under.
    pub fingerprint: String,
    /// Wall-clock time spent serving the request, in milliseconds.
    pub elapsed_ms: u64,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service version.
    pub version: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
}

/// Detailed health response aggregating component checks.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DetailedHealthResponse {
    /// Overall classification.
    pub status: HealthStatus,
    /// Cache health details.
    pub cache: CacheHealth,
    /// Whether the upstream analysis provider answered its health check.
    pub provider_reachable: bool,
}

/// Partial cache configuration update.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CacheConfigUpdateRequest {
    /// New enabled flag, if changing.
    #[serde(default)]
    pub enabled: Option<bool>,
    /// New entry TTL in seconds, if changing.
    #[serde(default)]
    pub ttl_secs: Option<u64>,
    /// New entry bound, if changing.
    #[serde(default)]
    pub max_entries: Option<usize>,
}

/// Cache configuration update response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CacheConfigUpdateResponse {
    /// Whether the update was applied.
    pub success: bool,
    /// Status message.
    pub message: String,
}

/// Cache clear response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ClearCacheResponse {
    /// Whether the cache was cleared.
    pub success: bool,
    /// Entries removed.
    pub removed: usize,
}

/// Metrics reset response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ResetMetricsResponse {
    /// Whether the metrics were reset.
    pub success: bool,
    /// New reset timestamp in epoch milliseconds.
    pub last_reset_ms: u64,
}

/// Recent diagnostic events snapshot.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RecentEventsResponse {
    /// Buffered events, oldest first.
    pub events: Vec<LiveEvent>,
    /// Number of events returned.
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_analyze_request_deserializes_with_defaults() {
        let request: AnalyzeRequest = serde_json::from_value(json!({
            "prompt": "describe the trend",
            "image_base64": "aGVsbG8="
        }))
        .unwrap();

        assert_eq!(request.prompt, "describe the trend");
        assert!(request.chart.symbol.is_none());
        assert!(request.chart.indicators.is_empty());
    }

    #[test]
    fn test_analyze_request_with_chart_metadata() {
        let request: AnalyzeRequest = serde_json::from_value(json!({
            "prompt": "find support levels",
            "image_base64": "aGVsbG8=",
            "chart": {
                "symbol": "BTCUSD",
                "timeframe": "4h",
                "indicators": ["RSI", "MACD"]
            }
        }))
        .unwrap();

        assert_eq!(request.chart.symbol.as_deref(), Some("BTCUSD"));
        assert_eq!(request.chart.timeframe.as_deref(), Some("4h"));
        assert_eq!(request.chart.indicators.len(), 2);
    }

    #[test]
    fn test_analyze_response_serialization() {
        let response = AnalyzeResponse {
            analysis: json!({ "trend": "bullish" }),
            cached: true,
            fingerprint: "abc123".to_string(),
            elapsed_ms: 12,
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"cached\":true"));
        assert!(json.contains("\"fingerprint\":\"abc123\""));
    }

    #[test]
    fn test_cache_config_update_request_partial() {
        let request: CacheConfigUpdateRequest =
            serde_json::from_value(json!({ "ttl_secs": 600 })).unwrap();

        assert_eq!(request.ttl_secs, Some(600));
        assert!(request.enabled.is_none());
        assert!(request.max_entries.is_none());
    }
}
