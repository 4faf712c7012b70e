use bytes::{Bytes, BytesMut};
use pingora::{Error, ErrorType};

/// Accumulates request body chunks until the body is complete, bounded by
/// `max_body_size`.
pub struct BodyInspector {
    pub max_body_size: usize,
    buffer: BytesMut,
}

impl BodyInspector {
    pub fn new(max_body_size: usize) -> Self {
        Self {
            max_body_size,
            buffer: BytesMut::new(),
        }
    }

    pub fn append_chunk(&mut self, chunk: &Bytes) -> Result<(), Box<Error>> {
        if self.buffer.len() + chunk.len() > self.max_body_size {
            return Err(Error::explain(
                ErrorType::Custom("BodySizeLimitExceeded"),
                format!(
                    "Request body exceeds maximum size of {} bytes",
                    self.max_body_size
                ),
            ));
        }

        self.buffer.extend_from_slice(chunk);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Hand over the buffered body, leaving the inspector empty.
    pub fn take_body(&mut self) -> Bytes {
        self.buffer.split().freeze()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulates_chunks() {
        let mut inspector = BodyInspector::new(16);
        inspector.append_chunk(&Bytes::from_static(b"{\"a\":")).unwrap();
        inspector.append_chunk(&Bytes::from_static(b"1}")).unwrap();
        assert_eq!(inspector.len(), 7);
        assert_eq!(inspector.take_body(), Bytes::from_static(b"{\"a\":1}"));
        assert!(inspector.is_empty());
    }

    #[test]
    fn test_rejects_oversized_body() {
        let mut inspector = BodyInspector::new(4);
        inspector.append_chunk(&Bytes::from_static(b"abc")).unwrap();
        assert!(inspector.append_chunk(&Bytes::from_static(b"de")).is_err());
        assert_eq!(inspector.len(), 3);
    }

    #[test]
    fn test_exact_limit_is_accepted() {
        let mut inspector = BodyInspector::new(4);
        assert!(inspector.append_chunk(&Bytes::from_static(b"abcd")).is_ok());
    }
}
