//! Client library for the Snap-Pad hardware one-time pad.
//!
//! A pair of twinned pads share identical pages of random data. One pad
//! encrypts and signs a message with fresh pages; its twin retrieves the same
//! pages by index to decrypt and verify. Every page is used exactly once.
//!
//! # Layout
//! - `config`: protocol constants (`PadConfig`).
//! - `core`: XOR keystream and masked HMAC primitives.
//! - `pad`: one-time `Page` values and the per-page crypto engine.
//! - `device`: line protocol client, transport adapters, software mock.
//! - `messaging`: multi-page message encryption and verification.
//! - `container`: binary, JSON and ASCII-armored message files.

#![forbid(unsafe_code)]

pub mod config;
pub mod container;
pub mod core;
pub mod device;
pub mod messaging;
pub mod pad;

pub use crate::config::PadConfig;
pub use crate::container::{Block, ContainerCodec, ContainerError, EncryptedMessage, Format};
pub use crate::device::{DeviceError, PadClient, StreamTransport, Transport};
pub use crate::messaging::{decrypt_and_verify, encrypt_and_sign, MessageError};
pub use crate::pad::{Page, PadError, Signature};
