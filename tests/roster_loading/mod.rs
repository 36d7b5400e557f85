mod roster_file_test;
