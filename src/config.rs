//! 환경 변수 기반 설정 관리

use std::env;
use std::str::FromStr;

/// 서버 설정
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    pub cors_origins: Vec<String>,
    pub room: RoomConfig,
    pub auth: AuthConfig,
    pub study_sets_file: Option<String>,
    pub log_level: String,
}

/// 방 설정
#[derive(Debug, Clone)]
pub struct RoomConfig {
    pub default_slot_count: usize,
    pub max_slot_count: usize,
    pub password_cost: u32,
    pub timeout_ms: u64,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            default_slot_count: 4,
            max_slot_count: 8,
            password_cost: bcrypt::DEFAULT_COST,
            timeout_ms: 3600000,
        }
    }
}

/// 세션 티켓 설정
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub ticket_ttl: u64,
}

fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// 환경 변수에서 설정 로드
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = RoomConfig::default();
        Self {
            port: parse_or("PORT", 5510),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            cors_origins: env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            room: RoomConfig {
                default_slot_count: parse_or("DEFAULT_SLOT_COUNT", defaults.default_slot_count),
                max_slot_count: parse_or("MAX_SLOT_COUNT", defaults.max_slot_count),
                password_cost: parse_or("PASSWORD_COST", defaults.password_cost),
                timeout_ms: parse_or("ROOM_TIMEOUT", defaults.timeout_ms),
            },
            auth: AuthConfig {
                secret: env::var("LOBBY_SECRET").unwrap_or_default(),
                ticket_ttl: parse_or("TICKET_TTL", 86400),
            },
            study_sets_file: env::var("STUDY_SETS_FILE").ok().filter(|s| !s.is_empty()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        }
    }

    /// 테스트 / 로컬 실행용 기본값
    pub fn for_secret(secret: &str) -> Self {
        Self {
            port: 5510,
            host: "127.0.0.1".to_string(),
            cors_origins: Vec::new(),
            room: RoomConfig::default(),
            auth: AuthConfig {
                secret: secret.to_string(),
                ticket_ttl: 3600,
            },
            study_sets_file: None,
            log_level: "info".to_string(),
        }
    }
}
