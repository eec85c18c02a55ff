use nestedset_core::MemoryNodeStore;

nestedset_test_support::conformance_suite!(MemoryNodeStore::new);
