// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Tensor element data types, named the way graph descriptions name them.

use std::fmt;

/// Element type of a [`crate::HostTensor`] or of a graph entry.
///
/// The string forms (`"float32"`, `"int8"`, ...) are the DLPack-style names
/// used in the `dltype` attribute of a graph program description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    /// 32-bit IEEE 754 floating point.
    Float32,
    /// 16-bit IEEE 754 floating point.
    Float16,
    /// 32-bit signed integer.
    Int32,
    /// 16-bit signed integer.
    Int16,
    /// 8-bit signed integer (quantised tensors).
    Int8,
    /// 8-bit unsigned integer.
    Uint8,
}

impl DType {
    /// Returns the size of a single element in bytes.
    pub fn size_bytes(self) -> usize {
        match self {
            DType::Float32 | DType::Int32 => 4,
            DType::Float16 | DType::Int16 => 2,
            DType::Int8 | DType::Uint8 => 1,
        }
    }

    /// Returns the DLPack-style name of this type.
    pub fn as_str(self) -> &'static str {
        match self {
            DType::Float32 => "float32",
            DType::Float16 => "float16",
            DType::Int32 => "int32",
            DType::Int16 => "int16",
            DType::Int8 => "int8",
            DType::Uint8 => "uint8",
        }
    }

    /// Parses a dtype name. Accepts the DLPack names and the short
    /// aliases (`"f32"`, `"i8"`, `"u8"`, ...). Case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "float32" | "f32" => Some(DType::Float32),
            "float16" | "f16" => Some(DType::Float16),
            "int32" | "i32" => Some(DType::Int32),
            "int16" | "i16" => Some(DType::Int16),
            "int8" | "i8" => Some(DType::Int8),
            "uint8" | "u8" => Some(DType::Uint8),
            _ => None,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_bytes() {
        assert_eq!(DType::Float32.size_bytes(), 4);
        assert_eq!(DType::Float16.size_bytes(), 2);
        assert_eq!(DType::Uint8.size_bytes(), 1);
    }

    #[test]
    fn test_parse() {
        assert_eq!(DType::parse("float32"), Some(DType::Float32));
        assert_eq!(DType::parse("F32"), Some(DType::Float32));
        assert_eq!(DType::parse("int8"), Some(DType::Int8));
        assert_eq!(DType::parse(" uint8 "), Some(DType::Uint8));
        assert_eq!(DType::parse("bfloat16"), None);
    }

    #[test]
    fn test_parse_display_agree() {
        for d in [
            DType::Float32,
            DType::Float16,
            DType::Int32,
            DType::Int16,
            DType::Int8,
            DType::Uint8,
        ] {
            assert_eq!(DType::parse(&d.to_string()), Some(d));
        }
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&DType::Float32).unwrap();
        assert_eq!(json, "\"float32\"");
    }
}
