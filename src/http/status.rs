use lazy_static::lazy_static;
use std::collections::HashMap;

lazy_static! {
    static ref REASON_PHRASES: HashMap<u16, &'static str> = {
        let mut m = HashMap::new();
        m.insert(100, "Continue");
        m.insert(101, "Switching Protocols");
        m.insert(102, "Processing");
        m.insert(200, "OK");
        m.insert(201, "Created");
        m.insert(202, "Accepted");
        m.insert(203, "Non-Authoritative Information");
        m.insert(204, "No Content");
        m.insert(205, "Reset Content");
        m.insert(206, "Partial Content");
        m.insert(207, "Multi-Status");
        m.insert(300, "Multiple Choices");
        m.insert(301, "Moved Permanently");
        m.insert(302, "Moved Temporarily");
        m.insert(303, "See Other");
        m.insert(304, "Not Modified");
        m.insert(305, "Use Proxy");
        m.insert(307, "Temporary Redirect");
        m.insert(400, "Bad Request");
        m.insert(401, "Unauthorized");
        m.insert(402, "Payment Required");
        m.insert(403, "Forbidden");
        m.insert(404, "Not Found");
        m.insert(405, "Method Not Allowed");
        m.insert(406, "Not Acceptable");
        m.insert(407, "Proxy Authentication Required");
        m.insert(408, "Request Time-out");
        m.insert(409, "Conflict");
        m.insert(410, "Gone");
        m.insert(411, "Length Required");
        m.insert(412, "Precondition Failed");
        m.insert(413, "Request Entity Too Large");
        m.insert(414, "Request-URI Too Large");
        m.insert(415, "Unsupported Media Type");
        m.insert(416, "Requested Range Not Satisfiable");
        m.insert(417, "Expectation Failed");
        m.insert(418, "I'm a teapot");
        m.insert(422, "Unprocessable Entity");
        m.insert(423, "Locked");
        m.insert(424, "Failed Dependency");
        m.insert(425, "Unordered Collection");
        m.insert(426, "Upgrade Required");
        m.insert(428, "Precondition Required");
        m.insert(429, "Too Many Requests");
        m.insert(431, "Request Header Fields Too Large");
        m.insert(451, "Unavailable For Legal Reasons");
        m.insert(500, "Internal Server Error");
        m.insert(501, "Not Implemented");
        m.insert(502, "Bad Gateway");
        m.insert(503, "Service Unavailable");
        m.insert(504, "Gateway Time-out");
        m.insert(505, "HTTP Version Not Supported");
        m.insert(506, "Variant Also Negotiates");
        m.insert(507, "Insufficient Storage");
        m.insert(509, "Bandwidth Limit Exceeded");
        m.insert(510, "Not Extended");
        m.insert(511, "Network Authentication Required");
        m
    };
}

pub fn reason_phrase(status: u16) -> Option<&'static str> {
    REASON_PHRASES.get(&status).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_and_unknown_codes() {
        assert_eq!(reason_phrase(200), Some("OK"));
        assert_eq!(reason_phrase(400), Some("Bad Request"));
        assert_eq!(reason_phrase(418), Some("I'm a teapot"));
        assert_eq!(reason_phrase(999), None);
        assert_eq!(reason_phrase(306), None);
    }
}
