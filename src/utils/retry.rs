use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::core::types::{deserialize_millis, serialize_millis};

/// 重试策略
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RetryStrategy {
    /// 固定延迟
    Fixed {
        #[serde(rename = "delay_ms", serialize_with = "serialize_millis", deserialize_with = "deserialize_millis")]
        delay: Duration,
    },
    /// 线性增长 `base * retries`
    Linear {
        #[serde(rename = "base_ms", serialize_with = "serialize_millis", deserialize_with = "deserialize_millis")]
        base: Duration,
        #[serde(rename = "max_delay_ms", serialize_with = "serialize_millis", deserialize_with = "deserialize_millis")]
        max_delay: Duration,
    },
    /// 指数退避 `initial * multiplier^(retries - 1)`
    Exponential {
        #[serde(rename = "initial_ms", serialize_with = "serialize_millis", deserialize_with = "deserialize_millis")]
        initial: Duration,
        multiplier: f64,
        #[serde(rename = "max_delay_ms", serialize_with = "serialize_millis", deserialize_with = "deserialize_millis")]
        max_delay: Duration,
    },
}

impl Default for RetryStrategy {
    fn default() -> Self {
        RetryStrategy::Linear {
            base: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryStrategy {
    /// 计算第 `retries` 次重试前的延迟（首次重试为 1）
    pub fn get_delay(&self, retries: u32) -> Duration {
        match self {
            RetryStrategy::Fixed { delay } => *delay,
            RetryStrategy::Linear { base, max_delay } => {
                let delay = base.saturating_mul(retries);
                std::cmp::min(delay, *max_delay)
            }
            RetryStrategy::Exponential { initial, multiplier, max_delay } => {
                let exponent = retries.saturating_sub(1) as f64;
                let secs = initial.as_secs_f64() * multiplier.powf(exponent);
                let delay = Duration::try_from_secs_f64(secs).unwrap_or(*max_delay);
                std::cmp::min(delay, *max_delay)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_delay_scales_with_retries() {
        let strategy = RetryStrategy::default();

        assert_eq!(strategy.get_delay(1), Duration::from_secs(1));
        assert_eq!(strategy.get_delay(2), Duration::from_secs(2));
        assert_eq!(strategy.get_delay(600), Duration::from_secs(60));
    }

    #[test]
    fn test_exponential_delay_is_capped() {
        let strategy = RetryStrategy::Exponential {
            initial: Duration::from_millis(500),
            multiplier: 2.0,
            max_delay: Duration::from_secs(3),
        };

        assert_eq!(strategy.get_delay(1), Duration::from_millis(500));
        assert_eq!(strategy.get_delay(2), Duration::from_secs(1));
        assert_eq!(strategy.get_delay(3), Duration::from_secs(2));
        assert_eq!(strategy.get_delay(10), Duration::from_secs(3));
    }

    #[test]
    fn test_strategy_from_toml() {
        let strategy: RetryStrategy = toml::from_str("kind = \"fixed\"\ndelay_ms = 250").unwrap();
        assert_eq!(strategy.get_delay(7), Duration::from_millis(250));
    }
}
