pub fn substitute(name: &str) -> String {
    name.chars()
        .filter(|ch| !matches!(ch, '[' | ']'))
        .map(|ch| match ch {
            '.' | '-' => '_',
            other => other,
        })
        .collect()
}

pub fn camel_to_snake(name: &str) -> String {
    let chars = name.chars().collect::<Vec<_>>();
    let words = split_capitalized_words(&chars);
    split_case_transitions(&words).to_lowercase()
}

pub fn standard_metric_name(prefix: &str, raw: &str) -> String {
    substitute(&format!("{prefix}_{raw}"))
}

pub fn container_metric_name(prefix: &str, raw: &str) -> String {
    substitute(&format!("{prefix}_{}", camel_to_snake(raw)))
}

pub fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || matches!(first, '_' | ':'))
        && chars.all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | ':'))
}

fn split_capitalized_words(chars: &[char]) -> Vec<char> {
    let mut out = Vec::with_capacity(chars.len() + chars.len() / 4);
    let mut index = 0;
    while index < chars.len() {
        let current = chars[index];
        let starts_word = current != '\n'
            && chars.get(index + 1).is_some_and(char::is_ascii_uppercase)
            && chars.get(index + 2).is_some_and(char::is_ascii_lowercase);

        if !starts_word {
            out.push(current);
            index += 1;
            continue;
        }

        out.push(current);
        out.push('_');
        out.push(chars[index + 1]);
        index += 2;
        while let Some(ch) = chars.get(index).filter(|ch| ch.is_ascii_lowercase()) {
            out.push(*ch);
            index += 1;
        }
    }
    out
}

fn split_case_transitions(chars: &[char]) -> String {
    let mut out = String::with_capacity(chars.len() + chars.len() / 4);
    let mut index = 0;
    while index < chars.len() {
        let current = chars[index];
        let lower_or_digit = current.is_ascii_lowercase() || current.is_ascii_digit();
        match chars.get(index + 1) {
            Some(next) if lower_or_digit && next.is_ascii_uppercase() => {
                out.push(current);
                out.push('_');
                out.push(*next);
                index += 2;
            }
            _ => {
                out.push(current);
                index += 1;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{
        camel_to_snake, container_metric_name, is_valid_metric_name, standard_metric_name,
        substitute,
    };

    #[test]
    fn substitute_strips_reserved_characters() {
        assert_eq!(substitute("content.proton.docs-active"), "content_proton_docs_active");
        assert_eq!(substitute("queue[0].size"), "queue0_size");

        for name in ["a.b-c[d]", "...", "x[y]-z.w", "plain_name"] {
            let converted = substitute(name);
            assert!(
                !converted.contains(['.', '-', '[', ']']),
                "{name} -> {converted}"
            );
        }
    }

    #[test]
    fn camel_to_snake_splits_words_and_acronyms() {
        assert_eq!(camel_to_snake("fooBarBAZQux"), "foo_bar_baz_qux");
        assert_eq!(camel_to_snake("serverActiveThreads"), "server_active_threads");
        assert_eq!(camel_to_snake("HTTPRequest"), "http_request");
        assert_eq!(camel_to_snake("getHTTPResponseCode"), "get_http_response_code");
        assert_eq!(camel_to_snake("jdisc.http.requests"), "jdisc.http.requests");
        assert_eq!(camel_to_snake("mem.heap.2Used"), "mem.heap.2_used");
        assert_eq!(camel_to_snake("aB"), "a_b");
        assert_eq!(camel_to_snake("ABCd"), "ab_cd");
    }

    #[test]
    fn camel_to_snake_is_a_no_op_on_snake_case() {
        for name in ["fooBarBAZQux", "serverActiveThreads", "HTTPRequest", "aB1Cd"] {
            let once = camel_to_snake(name);
            assert_eq!(camel_to_snake(&once), once);
        }
        assert_eq!(camel_to_snake("already_snake_case"), "already_snake_case");
    }

    #[test]
    fn container_names_combine_both_rules() {
        assert_eq!(
            container_metric_name("vespa_container", "serverNumRequests.rate"),
            "vespa_container_server_num_requests_rate"
        );
        assert_eq!(
            container_metric_name("vespa_container", "jdisc.http.handler-unhandledExceptions"),
            "vespa_container_jdisc_http_handler_unhandled_exceptions"
        );
        assert_eq!(
            container_metric_name("vespa_container", "Uptime"),
            "vespa_container_uptime"
        );
    }

    #[test]
    fn standard_names_keep_case() {
        assert_eq!(
            standard_metric_name("vespa_searchnode", "my.metric-x"),
            "vespa_searchnode_my_metric_x"
        );
        assert_eq!(
            standard_metric_name("vespa_distributor", "vds.idealstate.buckets_rechecking"),
            "vespa_distributor_vds_idealstate_buckets_rechecking"
        );
    }

    #[test]
    fn metric_name_validation_follows_exposition_rules() {
        for name in ["vespa_searchnode_docs", "_private", "ns:rule_total", "a1"] {
            assert!(is_valid_metric_name(name), "{name}");
        }
        for name in ["", "1abc", "vespa_bad/name", "vespa_with space", "caf\u{e9}"] {
            assert!(!is_valid_metric_name(name), "{name}");
        }
        assert!(!is_valid_metric_name(&standard_metric_name("vespa_searchnode", "disk/usage")));
    }
}
