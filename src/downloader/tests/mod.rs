use super::test_helpers::*;
