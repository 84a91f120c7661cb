mod test_joiner_basic;
