//! Builds tiny ONNX graphs on disk so the runtime adapters can be tested
//! without a trained network.
//!
//! Only the handful of `onnx.proto` fields these graphs need are encoded.

use std::path::PathBuf;
use tempfile::TempDir;

const FLOAT: u64 = 1;
const INT64: u64 = 7;
const ATTRIBUTE_INTS: u64 = 7;

fn varint(mut value: u64, buf: &mut Vec<u8>) {
    while value >= 0x80 {
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

fn key(field: u64, wire_type: u64, buf: &mut Vec<u8>) {
    varint((field << 3) | wire_type, buf);
}

fn varint_field(field: u64, value: u64, buf: &mut Vec<u8>) {
    key(field, 0, buf);
    varint(value, buf);
}

fn bytes_field(field: u64, bytes: &[u8], buf: &mut Vec<u8>) {
    key(field, 2, buf);
    varint(bytes.len() as u64, buf);
    buf.extend_from_slice(bytes);
}

pub struct ValueInfo {
    name: String,
    elem_type: u64,
    dims: Vec<u64>,
}

impl ValueInfo {
    pub fn float(name: &str, dims: &[u64]) -> Self {
        Self {
            name: name.to_string(),
            elem_type: FLOAT,
            dims: dims.to_vec(),
        }
    }

    pub fn int64(name: &str, dims: &[u64]) -> Self {
        Self {
            name: name.to_string(),
            elem_type: INT64,
            dims: dims.to_vec(),
        }
    }

    fn encode(&self) -> Vec<u8> {
        let mut shape = Vec::new();
        for &dim in &self.dims {
            let mut dimension = Vec::new();
            varint_field(1, dim, &mut dimension);
            bytes_field(1, &dimension, &mut shape);
        }

        let mut tensor_type = Vec::new();
        varint_field(1, self.elem_type, &mut tensor_type);
        bytes_field(2, &shape, &mut tensor_type);

        let mut type_proto = Vec::new();
        bytes_field(1, &tensor_type, &mut type_proto);

        let mut buf = Vec::new();
        bytes_field(1, self.name.as_bytes(), &mut buf);
        bytes_field(2, &type_proto, &mut buf);
        buf
    }
}

pub struct Node {
    op_type: String,
    inputs: Vec<String>,
    output: String,
    ints: Vec<(String, Vec<i64>)>,
}

impl Node {
    pub fn new(op_type: &str, inputs: &[&str], output: &str) -> Self {
        Self {
            op_type: op_type.to_string(),
            inputs: inputs.iter().map(|i| i.to_string()).collect(),
            output: output.to_string(),
            ints: Vec::new(),
        }
    }

    pub fn with_ints(mut self, name: &str, values: &[i64]) -> Self {
        self.ints.push((name.to_string(), values.to_vec()));
        self
    }

    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for input in &self.inputs {
            bytes_field(1, input.as_bytes(), &mut buf);
        }
        bytes_field(2, self.output.as_bytes(), &mut buf);
        bytes_field(4, self.op_type.as_bytes(), &mut buf);
        for (name, values) in &self.ints {
            let mut attribute = Vec::new();
            bytes_field(1, name.as_bytes(), &mut attribute);
            for &v in values {
                varint_field(8, v as u64, &mut attribute);
            }
            varint_field(20, ATTRIBUTE_INTS, &mut attribute);
            bytes_field(5, &attribute, &mut buf);
        }
        buf
    }
}

/// Serializes a single-graph model at IR version 8, default domain opset 13.
pub fn model_bytes(nodes: &[Node], inputs: &[ValueInfo], outputs: &[ValueInfo]) -> Vec<u8> {
    let mut graph = Vec::new();
    for node in nodes {
        bytes_field(1, &node.encode(), &mut graph);
    }
    bytes_field(2, b"fixture", &mut graph);
    for input in inputs {
        bytes_field(11, &input.encode(), &mut graph);
    }
    for output in outputs {
        bytes_field(12, &output.encode(), &mut graph);
    }

    let mut opset = Vec::new();
    varint_field(2, 13, &mut opset);

    let mut model = Vec::new();
    varint_field(1, 8, &mut model);
    bytes_field(7, &graph, &mut model);
    bytes_field(8, &opset, &mut model);
    model
}

/// Writes the model into a fresh temporary directory. Keep the `TempDir`
/// alive for as long as the path is used.
pub fn write_model(
    nodes: &[Node],
    inputs: &[ValueInfo],
    outputs: &[ValueInfo],
) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.onnx");
    std::fs::write(&path, model_bytes(nodes, inputs, outputs)).unwrap();
    (dir, path)
}

/// A stand-in classifier: the score is the mean of the NHWC input.
pub fn mean_classifier() -> (TempDir, PathBuf) {
    write_model(
        &[Node::new("ReduceMean", &["image"], "score").with_ints("axes", &[1, 2, 3])],
        &[ValueInfo::float("image", &[1, 224, 224, 3])],
        &[ValueInfo::float("score", &[1, 1, 1, 1])],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varint_encoding() {
        let mut buf = Vec::new();
        varint(1, &mut buf);
        varint(300, &mut buf);
        assert_eq!(buf, vec![0x01, 0xac, 0x02]);
    }

    #[test]
    fn test_value_info_encoding() {
        let encoded = ValueInfo::float("x", &[2]).encode();

        // name "x", then type { tensor_type { elem_type 1, shape { dim { dim_value 2 } } } }
        assert_eq!(
            encoded,
            vec![
                0x0a, 0x01, b'x', 0x12, 0x0a, 0x0a, 0x08, 0x08, 0x01, 0x12, 0x04, 0x0a, 0x02,
                0x08, 0x02
            ]
        );
    }
}
