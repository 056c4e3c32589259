/// Execution limits. These bound every run regardless of tenant or workflow
/// shape — there is no per-tenant override at this layer.
pub const MAX_STEPS: u32 = 50;
pub const MAX_DURATION_MS: u64 = 300_000;
pub const APPROVAL_TTL_MS: i64 = 300_000;
pub const DEFAULT_MAX_INPUT_CHARS: usize = 50_000;
