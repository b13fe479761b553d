//! # Remote Crop
//!
//! Frames are pushed over one persistent socket to a server-side cropper,
//! which answers each frame with a contour or a "not a document" signal.
//! The socket itself is a host collaborator ([`CropTransport`]); this module
//! owns the wire format and the request/response discipline on top of it.

pub mod client;
pub mod wire;

pub use client::{CropTransport, RemoteCropClient, RemoteReply};
pub use wire::{RemoteEvent, SocketStatus};
