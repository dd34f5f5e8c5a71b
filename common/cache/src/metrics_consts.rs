pub const CACHE_READS_COUNTER: &str = "cache_aside_reads_total";
pub const CACHE_HIT_COUNTER: &str = "cache_aside_hit_total";
pub const CACHE_SKIPPED_COUNTER: &str = "cache_aside_skipped_total";
pub const CACHE_CORRUPTED_COUNTER: &str = "cache_aside_corrupted_total";
pub const CACHE_WRITES_COUNTER: &str = "cache_aside_writes_total";
pub const CACHE_EVICTIONS_COUNTER: &str = "cache_aside_evicted_keys_total";
pub const CACHE_ERRORS_COUNTER: &str = "cache_aside_errors_total";
pub const STORE_CALLS_COUNTER: &str = "cache_aside_store_calls_total";
pub const STORE_CALL_TIME: &str = "cache_aside_store_call_ms";
