use nestedset_sqlite::SqliteNodeStore;

nestedset_test_support::conformance_suite!(|| SqliteNodeStore::new_in_memory().unwrap());
