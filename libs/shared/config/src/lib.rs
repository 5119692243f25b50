use std::env;
use std::str::FromStr;
use tracing::warn;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_CODE_MAX_ATTEMPTS: u32 = 64;
pub const DEFAULT_MINUTES_PER_QUEUE_POSITION: i32 = 5;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub port: u16,
    /// Offset of the clinic's local time from UTC, used to decide which
    /// calendar day an appointment belongs to.
    pub clinic_utc_offset_minutes: i32,
    pub code_max_attempts: u32,
    pub minutes_per_queue_position: i32,
    pub serialize_bucket_writes: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_jwt_secret: String::new(),
            port: DEFAULT_PORT,
            clinic_utc_offset_minutes: 0,
            code_max_attempts: DEFAULT_CODE_MAX_ATTEMPTS,
            minutes_per_queue_position: DEFAULT_MINUTES_PER_QUEUE_POSITION,
            serialize_bucket_writes: true,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            port: parse_var("PORT", defaults.port),
            clinic_utc_offset_minutes: parse_var(
                "CLINIC_UTC_OFFSET_MINUTES",
                defaults.clinic_utc_offset_minutes,
            ),
            code_max_attempts: parse_var("CODE_MAX_ATTEMPTS", defaults.code_max_attempts),
            minutes_per_queue_position: parse_var(
                "MINUTES_PER_QUEUE_POSITION",
                defaults.minutes_per_queue_position,
            ),
            serialize_bucket_writes: parse_var(
                "SERIALIZE_BUCKET_WRITES",
                defaults.serialize_bucket_writes,
            ),
        };

        if !config.is_configured() {
            warn!("Supabase not configured - falling back to in-memory storage");
        }

        if !config.serialize_bucket_writes {
            warn!("SERIALIZE_BUCKET_WRITES disabled - queue positions may race under concurrent bookings");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
    }

    pub fn is_auth_configured(&self) -> bool {
        !self.supabase_jwt_secret.is_empty()
    }
}

fn parse_var<T>(name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}
