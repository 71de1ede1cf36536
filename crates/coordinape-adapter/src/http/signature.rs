/*
[INPUT]:  Serialized payload, its wallet signature and hash, signer address
[OUTPUT]: Request envelope as JSON body, query pairs or multipart form
[POS]:    HTTP layer - wire shape of signed requests
[UPDATE]: When changing envelope fields or upload form layout
*/

use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::http::Result;

/// `{signature, data, address, hash}` attached to every mutating call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedEnvelope {
    pub signature: String,
    pub data: String,
    pub address: String,
    pub hash: String,
}

impl SignedEnvelope {
    /// Envelope fields as a JSON object, ready to take extra top-level fields
    pub fn into_json(self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("signature".to_string(), Value::String(self.signature));
        map.insert("data".to_string(), Value::String(self.data));
        map.insert("address".to_string(), Value::String(self.address));
        map.insert("hash".to_string(), Value::String(self.hash));
        map
    }

    pub fn query_pairs(&self) -> [(&str, &str); 4] {
        [
            ("signature", self.signature.as_str()),
            ("data", self.data.as_str()),
            ("address", self.address.as_str()),
            ("hash", self.hash.as_str()),
        ]
    }

    /// Multipart upload form; `data` carries the file name
    pub fn into_form(self, file_name: &str, bytes: Vec<u8>) -> Result<Form> {
        let file = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("application/octet-stream")?;

        Ok(Form::new()
            .text("signature", self.signature)
            .text("address", self.address)
            .text("hash", self.hash)
            .text("data", self.data)
            .part("file", file))
    }
}
