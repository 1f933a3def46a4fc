//! Mapping of `Redis` errors onto the collaborator error types.

use flash_sale_core::{CoordinationError, CounterError, ProductId};
use redis::{ErrorKind, RedisError};

fn is_connection_failure(e: &RedisError) -> bool {
    e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout()
}

pub(crate) fn counter_error(e: &RedisError, product_id: ProductId) -> CounterError {
    if is_connection_failure(e) {
        CounterError::Connection(e.to_string())
    } else if e.kind() == ErrorKind::ResponseError && e.to_string().contains("not an integer") {
        CounterError::NotAnInteger { product_id }
    } else {
        CounterError::Other(e.to_string())
    }
}

pub(crate) fn coordination_error(e: &RedisError) -> CoordinationError {
    if is_connection_failure(e) {
        CoordinationError::Connection(e.to_string())
    } else if e.kind() == ErrorKind::TypeError {
        CoordinationError::Protocol(e.to_string())
    } else {
        CoordinationError::Other(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_errors_map_by_message() {
        let id = ProductId::new(3);
        let not_int = RedisError::from((
            ErrorKind::ResponseError,
            "An error was signalled by the server",
            "value is not an integer or out of range".to_string(),
        ));
        assert_eq!(
            counter_error(&not_int, id),
            CounterError::NotAnInteger { product_id: id }
        );

        let other = RedisError::from((ErrorKind::ResponseError, "WRONGTYPE"));
        assert!(matches!(counter_error(&other, id), CounterError::Other(_)));
    }

    #[test]
    fn io_errors_are_connection_failures() {
        let io = RedisError::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "refused",
        ));
        assert!(matches!(
            counter_error(&io, ProductId::new(1)),
            CounterError::Connection(_)
        ));
        assert!(matches!(
            coordination_error(&io),
            CoordinationError::Connection(_)
        ));
    }

    #[test]
    fn type_errors_are_protocol_errors() {
        let e = RedisError::from((ErrorKind::TypeError, "unexpected reply"));
        assert!(matches!(coordination_error(&e), CoordinationError::Protocol(_)));
    }
}
