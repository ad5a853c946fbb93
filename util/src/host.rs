//! Host platform (linux for example) utility functions

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Information on the machine the executable is running on.
#[derive(Debug, Clone)]
pub struct HostInfo {
    pub sysname: String,
    pub nodename: String,
    pub release: String,
    pub version: String,
    pub machine: String,
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Retrieve uname information.
pub fn get_uname() -> std::io::Result<HostInfo> {
    let info = uname::uname()?;

    Ok(HostInfo {
        sysname: info.sysname,
        nodename: info.nodename,
        release: info.release,
        version: info.version,
        machine: info.machine,
    })
}
