use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Unable to retrieve the host name, error: {source}"))]
    Hostname { source: nix::errno::Errno },

    #[snafu(display("Host name is not valid UTF-8"))]
    HostnameEncoding,

    #[snafu(display("Unable to retrieve the current user, error: {source}"))]
    LookupUser { source: nix::errno::Errno },

    #[snafu(display("Current user (uid {uid}) has no password database entry"))]
    UnknownUser { uid: u32 },
}
