use std::sync::LazyLock;

use crate::kvs::Check;

/// The default amount of memory, in bytes, that a row buffer allocates.
pub static ROW_BUFFER_PREFERRED_SIZE: LazyLock<usize> =
	lazy_env_parse!("FRACTALDB_ROW_BUFFER_PREFERRED_SIZE", usize, 128 * 1024);

/// When a row buffer has less than this many bytes of slack it is considered full.
pub static ROW_BUFFER_GORGED_THRESHOLD: LazyLock<usize> =
	lazy_env_parse!("FRACTALDB_ROW_BUFFER_GORGED_THRESHOLD", usize, 100);

/// The maximum number of rows that a single bulk fetch will request.
pub static BULK_FETCH_MAX_ROWS: LazyLock<usize> =
	lazy_env_parse!("FRACTALDB_BULK_FETCH_MAX_ROWS", usize, 4096);

/// The number of keys counted in a single bulk count call.
pub static COUNT_BATCH_SIZE: LazyLock<usize> =
	lazy_env_parse!("FRACTALDB_COUNT_BATCH_SIZE", usize, 4096);

/// How long, in milliseconds, a range lock request waits before giving up.
pub static LOCK_TIMEOUT_MS: LazyLock<u64> =
	lazy_env_parse!("FRACTALDB_LOCK_TIMEOUT_MS", u64, 4000);

/// What to do when a transaction is dropped without being committed or cancelled.
pub static TRANSACTION_CHECK: LazyLock<Check> =
	lazy_env_parse!("FRACTALDB_TRANSACTION_CHECK", Check, Check::Warn);
