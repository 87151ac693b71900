// Market integration tests
