// Constants module for shared values

/// Server-relative directory plugins are staged into.
pub const PLUGIN_INSTALL_DIR: &str = "/plugins";

/// Request-level bound on page size, the tightest of the marketplace caps.
pub const MAX_PAGE_SIZE: u32 = 50;
