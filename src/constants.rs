//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Goal planning constants shared by every vertical
pub mod planning {
    /// Working weeks per month used by the daily-flow formula
    pub const WEEKS_PER_MONTH: f64 = 4.33;

    /// Contacts per primary unit when the contact conversion rate is zero
    pub const ZERO_RATE_CONTACT_MULTIPLIER: f64 = 5.0;

    /// Allowed goal horizon in months
    pub const MIN_TIMEFRAME_MONTHS: u32 = 1;
    pub const MAX_TIMEFRAME_MONTHS: u32 = 60;

    /// Decimal places kept for per-month / per-week figures
    pub const RATE_DECIMALS: i32 = 2;
}

/// Network marketing adapter constants
pub mod network_marketing {
    /// Share of team volume paid out as commission
    pub const COMMISSION_RATE: f64 = 0.08;

    /// Monthly personal volume generated by one customer or partner
    pub const AVG_CUSTOMER_VOLUME: f64 = 100.0;

    /// Split of new units between partners and customers
    pub const PARTNER_SHARE: f64 = 0.3;

    /// Contact boost per unit of partner share (partners need more prospecting)
    pub const PARTNER_CONTACT_BOOST: f64 = 0.5;

    /// Partners supported by one weekly team call
    pub const PARTNERS_PER_TEAM_CALL: u64 = 5;

    pub const CONFIDENCE_INCOME: f64 = 0.75;
    pub const CONFIDENCE_VOLUME: f64 = 0.8;
    pub const CONFIDENCE_DIRECT: f64 = 0.85;
    /// Rank goals use the built-in requirements table
    pub const CONFIDENCE_RANK: f64 = 0.7;

    /// Built-in rank requirements: (rank id, label, monthly team volume, active partners)
    pub const RANK_REQUIREMENTS: &[(&str, &str, f64, u64)] = &[
        ("bronze", "Bronze", 1_000.0, 3),
        ("silver", "Silver", 3_000.0, 5),
        ("gold", "Gold", 7_500.0, 10),
        ("platinum", "Platinum", 15_000.0, 20),
        ("diamond", "Diamond", 40_000.0, 50),
    ];
}

/// Real estate adapter constants
pub mod real_estate {
    /// Average gross commission per closed deal
    pub const AVG_COMMISSION_PER_DEAL: f64 = 10_500.0;
    pub const VIEWING_TO_DEAL: f64 = 0.15;
    pub const CONTACT_TO_VIEWING: f64 = 0.25;

    pub const CONFIDENCE_INCOME: f64 = 0.8;
    pub const CONFIDENCE_DEALS: f64 = 0.85;
}

/// Finance adapter constants
pub mod finance {
    /// Average first-year revenue per client
    pub const AVG_CLIENT_VALUE: f64 = 2_500.0;
    pub const APPOINTMENT_TO_CLIENT: f64 = 0.3;
    pub const CONTACT_TO_APPOINTMENT: f64 = 0.2;

    pub const CONFIDENCE_INCOME: f64 = 0.8;
    pub const CONFIDENCE_CLIENTS: f64 = 0.85;
}

/// Coaching adapter constants
pub mod coaching {
    /// Average program value per client
    pub const AVG_CLIENT_VALUE: f64 = 3_000.0;
    pub const CALL_TO_CLIENT: f64 = 0.25;
    pub const CONTACT_TO_CALL: f64 = 0.2;

    pub const CONFIDENCE_INCOME: f64 = 0.8;
    pub const CONFIDENCE_CLIENTS: f64 = 0.9;
}

/// Follow-up engine constants
pub mod followup {
    /// Days without any interaction before a sequence is ghosted
    pub const DEFAULT_GHOSTING_DAYS: u32 = 30;

    /// Recent interactions loaded per lead
    pub const DEFAULT_RECENT_INTERACTIONS: usize = 20;

    /// Leads evaluated concurrently by the today query
    pub const DEFAULT_CONCURRENCY: usize = 8;

    /// Default local business window
    pub const DEFAULT_BUSINESS_START_HOUR: u32 = 9;
    pub const DEFAULT_BUSINESS_END_HOUR: u32 = 19;

    pub const DEFAULT_TIMEZONE: &str = "Europe/Berlin";

    /// Priority thresholds: (lead score, days since contact)
    pub mod priority {
        pub const CRITICAL_SCORE: u32 = 80;
        pub const CRITICAL_DAYS: i64 = 7;
        pub const HIGH_SCORE: u32 = 50;
        pub const HIGH_DAYS: i64 = 3;
        pub const STALE_DAYS: i64 = 7;
    }
}

/// Workflow detector constants
pub mod workflow {
    /// Days since last contact after which a lead is considered cold
    pub const COLD_AFTER_DAYS: i64 = 7;

    /// Queue item scores (sorted descending)
    pub mod score {
        pub const CLOSED: u32 = 0;
        pub const HOT_LEAD: u32 = 100;
        pub const RESPONSE_QUALIFIED: u32 = 95;
        pub const RESPONSE: u32 = 85;
        pub const FOLLOWUP_DUE: u32 = 80;
        pub const QUALIFIED: u32 = 75;
        pub const NEW_LEAD: u32 = 60;
        pub const GONE_COLD: u32 = 50;
        pub const WAITING: u32 = 30;
    }

    /// Default queue size
    pub const DEFAULT_QUEUE_LIMIT: usize = 20;

    /// Leads loaded per queue pass
    pub const DEFAULT_PASS_LIMIT: usize = 50;
}

/// Channel constants
pub mod channels {
    /// Maximum message body length per channel (characters)
    pub const WHATSAPP_MAX_LEN: usize = 4096;
    pub const EMAIL_MAX_LEN: usize = 100_000;
    pub const LINKEDIN_MAX_LEN: usize = 8000;
    pub const INSTAGRAM_MAX_LEN: usize = 1000;

    /// Maximum email subject length
    pub const EMAIL_SUBJECT_MAX_LEN: usize = 998;
}

/// AI router constants
pub mod ai {
    pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
    pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
    pub const DEFAULT_TEMPERATURE: f32 = 0.7;
    pub const DEFAULT_MAX_TOKENS: u32 = 400;

    /// Timeout for follow-up drafting calls (seconds)
    pub const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 20;

    /// Prompt version reported with generated drafts
    pub const PROMPT_VERSION: &str = "followup-v1";
}

/// HTTP/Network constants
pub mod network {
    /// Default request timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

    /// Connection timeout (seconds)
    pub const CONNECTION_TIMEOUT_SECS: u64 = 10;

    /// Maximum retries for network requests
    pub const MAX_NETWORK_RETRIES: usize = 3;

    /// Base delay for exponential backoff (milliseconds)
    pub const BASE_DELAY_MS: u64 = 500;

    /// Maximum delay between retries (seconds)
    pub const MAX_DELAY_SECS: u64 = 10;
}
