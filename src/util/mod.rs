pub(crate) mod encode;
pub(crate) mod hash;
pub(crate) mod headers;
pub(crate) mod part;
pub(crate) mod redact;
pub(crate) mod signing;
pub(crate) mod url;
pub(crate) mod validate;
pub(crate) mod xml;
