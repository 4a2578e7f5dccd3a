#![crate_name = "ofp13"]
#![crate_type = "lib"]

//! OpenFlow 1.3 wire codec, OXM flow matches and flow tags.

mod bits;
mod ofp_utils;

pub mod error;
pub mod experimenter;
pub mod ofp_header;
pub mod ofp_match;
pub mod ofp_message;
pub mod openflow0x04;
pub mod oxm;
pub mod tag;

pub use error::{OfpError, Result};
pub use experimenter::{Experimenter, ExperimenterMsg};
pub use ofp_match::{Match, MatchEntry};
pub use ofp_message::OfpMessage;
pub use openflow0x04::message::Message;
pub use tag::{Tag, TagSet};
