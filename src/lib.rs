#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub use vc_bind as bind;

#[cfg(feature = "xml")]
pub use vc_bind_xml as xml;
