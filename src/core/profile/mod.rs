pub mod codec;
pub mod store;

pub use codec::{
    decode_shared_profile, encode_shared_profile, parse_import_link, ShareableProfile,
    DEEP_LINK_SCHEME,
};
pub use store::{process_invocation, FileProfileStore, ProfileStore};
