//! # SVGA Container Module
//!
//! Questo modulo legge e scrive il container binario SVGA 2.x.
//!
//! ## Formato:
//! - Payload compresso zlib (deflate con header)
//! - Contenuto: messaggio protobuf `com.opensource.svga.MovieEntity`
//!
//! ## Strutture:
//! - `MovieEntity`: versione, parametri, mappa `images` (chiave → bytes PNG), sprite, audio
//! - `MovieParams`: viewBox, fps, numero di frame
//!
//! ## Note:
//! - `sprites` e `audios` sono mantenuti come bytes opachi: stesso wire type
//!   (length-delimited) dei messaggi annidati, quindi vengono riscritti identici
//! - SVGA 1.x (archivio zip) non è supportato

use crate::error::CompressError;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use prost::Message;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::Path;
use tracing::debug;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

#[derive(Clone, PartialEq, prost::Message)]
pub struct MovieParams {
    #[prost(float, tag = "1")]
    pub view_box_width: f32,
    #[prost(float, tag = "2")]
    pub view_box_height: f32,
    #[prost(int32, tag = "3")]
    pub fps: i32,
    #[prost(int32, tag = "4")]
    pub frames: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct MovieEntity {
    #[prost(string, tag = "1")]
    pub version: String,
    #[prost(message, optional, tag = "2")]
    pub params: Option<MovieParams>,
    #[prost(map = "string, bytes", tag = "3")]
    pub images: HashMap<String, Vec<u8>>,
    /// Encoded `SpriteEntity` messages
    #[prost(bytes = "vec", repeated, tag = "4")]
    pub sprites: Vec<Vec<u8>>,
    /// Encoded `AudioEntity` messages
    #[prost(bytes = "vec", repeated, tag = "5")]
    pub audios: Vec<Vec<u8>>,
}

impl MovieEntity {
    /// Decode an SVGA 2.x file body
    pub fn decode_container(bytes: &[u8]) -> Result<Self, CompressError> {
        if bytes.starts_with(ZIP_MAGIC) {
            return Err(CompressError::client(
                "SVGA 1.x (zip) containers are not supported",
            ));
        }

        let mut inflated = Vec::new();
        ZlibDecoder::new(bytes)
            .read_to_end(&mut inflated)
            .map_err(|e| CompressError::client(format!("invalid SVGA zlib payload: {}", e)))?;

        let movie = MovieEntity::decode(inflated.as_slice())?;
        debug!(
            "Decoded SVGA movie v{} with {} images, {} sprites",
            movie.version,
            movie.images.len(),
            movie.sprites.len()
        );
        Ok(movie)
    }

    /// Encode back to an SVGA 2.x file body
    pub fn encode_container(&self) -> Result<Vec<u8>, CompressError> {
        let mut raw = Vec::with_capacity(self.encoded_len());
        self.encode(&mut raw)?;

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(&raw)?;
        Ok(encoder.finish()?)
    }

    /// Read and decode an SVGA file
    pub async fn read(path: &Path) -> Result<Self, CompressError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            CompressError::io(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::decode_container(&bytes)
    }

    pub fn params_or_default(&self) -> MovieParams {
        self.params.clone().unwrap_or_default()
    }
}
