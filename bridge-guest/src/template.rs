//! Positional placeholders for dynamic code.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

/// Turn `code` with `{}` placeholders into a function of `arity` parameters.
///
/// The first `arity` placeholders become `p0`, `p1`, ... in order; any
/// further `{}` are left as written.
///
/// ```
/// use bridge_guest::template::expand;
///
/// assert_eq!(
///     expand("{}.setAttribute({}, {})", 3),
///     "function(p0,p1,p2){ p0.setAttribute(p1, p2) }"
/// );
/// ```
pub fn expand(code: &str, arity: usize) -> String {
    let names: Vec<String> = (0..arity).map(|i| format!("p{}", i)).collect();
    let mut body = String::with_capacity(code.len());
    let mut rest = code;
    for name in &names {
        match rest.find("{}") {
            Some(pos) => {
                body.push_str(&rest[..pos]);
                body.push_str(name);
                rest = &rest[pos + 2..];
            }
            None => break,
        }
    }
    body.push_str(rest);
    format!("function({}){{ {} }}", names.join(","), body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand() {
        assert_eq!(expand("console.log({})", 1), "function(p0){ console.log(p0) }");
        assert_eq!(expand("{}[{}] = {}", 3), "function(p0,p1,p2){ p0[p1] = p2 }");
        assert_eq!(
            expand("return document.body", 0),
            "function(){ return document.body }"
        );
    }

    #[test]
    fn test_surplus_placeholders_kept() {
        // An empty object literal written as `{}` takes the first slot.
        assert_eq!(
            expand("f({},{},{})", 2),
            "function(p0,p1){ f(p0,p1,{}) }"
        );
        assert_eq!(expand("g({})", 2), "function(p0,p1){ g(p0) }");
    }
}
