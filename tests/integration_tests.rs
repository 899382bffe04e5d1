// Gateway file to expose integration tests from the integration/ subdirectory.
// Each test file in integration/ needs to be included here.

mod common;

#[path = "integration/test_search_end_to_end.rs"]
mod test_search_end_to_end;

#[path = "integration/test_incremental_update.rs"]
mod test_incremental_update;

#[path = "integration/test_index_integrity.rs"]
mod test_index_integrity;

#[path = "integration/test_ann_fallback.rs"]
mod test_ann_fallback;
