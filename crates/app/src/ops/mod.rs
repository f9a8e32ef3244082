pub mod cat;
pub mod cp;
pub mod init;
pub mod mkdir;
pub mod put;
pub mod rm;
pub mod stat;
pub mod version;

pub use cat::Cat;
pub use cp::Cp;
pub use init::Init;
pub use mkdir::Mkdir;
pub use put::Put;
pub use rm::Rm;
pub use stat::Stat;
pub use version::Version;
