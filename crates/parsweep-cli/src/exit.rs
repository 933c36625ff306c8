// Exit codes for scripted sweeps
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_GENERIC_FAIL: i32 = 1;
pub const EXIT_USAGE: i32 = 2;
pub const EXIT_BUILD_FAIL: i32 = 3;
pub const EXIT_VALIDATION_FAIL: i32 = 4;
