//! 관계 그래프 집계: 모듈 결과의 관계를 중복 없이 누적
//!
//! 중복 판정 키는 `(source 소문자, target 소문자, type)`이며
//! 먼저 관측된 엣지(레이블 포함)가 유지됩니다. 추가만 가능하고 제거는 없습니다.

use std::collections::HashSet;

use serde::Serialize;

use crate::types::Relationship;

type EdgeKey = (String, String, String);

fn edge_key(rel: &Relationship) -> EdgeKey {
    (
        rel.source.to_lowercase(),
        rel.target.to_lowercase(),
        rel.kind.clone(),
    )
}

fn is_well_formed(rel: &Relationship) -> bool {
    !rel.source.trim().is_empty() && !rel.target.trim().is_empty()
}

/// 그래프 노드
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    /// 엔티티 값 (처음 관측된 표기)
    pub id: String,
}

/// 증분 관계 그래프
///
/// 잡마다 하나씩 존재하며 잡 드라이버만 갱신합니다.
#[derive(Debug, Clone, Default)]
pub struct RelationshipGraph {
    edges: Vec<Relationship>,
    keys: HashSet<EdgeKey>,
}

impl RelationshipGraph {
    /// 빈 그래프를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 새 관계를 병합하고 이번에 새로 추가된 엣지만 반환합니다.
    ///
    /// 출발 또는 도착이 빈 관계는 버립니다.
    pub fn merge(&mut self, incoming: &[Relationship]) -> Vec<Relationship> {
        let mut added = Vec::new();
        for rel in incoming {
            if !is_well_formed(rel) {
                continue;
            }
            if self.keys.insert(edge_key(rel)) {
                self.edges.push(rel.clone());
                added.push(rel.clone());
            }
        }
        added
    }

    /// 관측 순서대로 모든 엣지를 반환합니다.
    pub fn edges(&self) -> &[Relationship] {
        &self.edges
    }

    /// 엣지 수
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// 엣지가 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// 노드 목록을 도출합니다.
    pub fn nodes(&self) -> Vec<GraphNode> {
        nodes(&self.edges)
    }
}

/// 기존 목록과 새 목록을 합친 중복 없는 목록을 반환합니다.
pub fn merge(existing: &[Relationship], incoming: &[Relationship]) -> Vec<Relationship> {
    let mut graph = RelationshipGraph::new();
    graph.merge(existing);
    graph.merge(incoming);
    graph.edges
}

/// 엣지 목록에서 대소문자 무시 고유 엔티티를 처음 관측된 표기로 도출합니다.
pub fn nodes(edges: &[Relationship]) -> Vec<GraphNode> {
    let mut seen = HashSet::new();
    let mut nodes = Vec::new();
    for rel in edges {
        for value in [&rel.source, &rel.target] {
            if seen.insert(value.to_lowercase()) {
                nodes.push(GraphNode { id: value.clone() });
            }
        }
    }
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::relation;

    fn rel(source: &str, target: &str, kind: &str) -> Relationship {
        Relationship::new(source, target, kind)
    }

    #[test]
    fn merge_deduplicates_case_insensitively() {
        let existing = vec![rel("Example.com", "1.2.3.4", relation::RESOLVES_TO)];
        let incoming = vec![
            rel("example.COM", "1.2.3.4", relation::RESOLVES_TO),
            rel("example.com", "5.6.7.8", relation::RESOLVES_TO),
        ];
        let merged = merge(&existing, &incoming);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].source, "Example.com");
    }

    #[test]
    fn differing_type_is_a_distinct_edge() {
        let merged = merge(
            &[rel("example.com", "ns1.example.com", relation::HAS_NS)],
            &[rel("example.com", "ns1.example.com", relation::CNAME_TO)],
        );
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn first_observed_label_wins() {
        let mut graph = RelationshipGraph::new();
        graph.merge(&[rel("example.com", "mx.example.com", relation::HAS_MX).with_label("10")]);
        let added =
            graph.merge(&[rel("example.com", "mx.example.com", relation::HAS_MX).with_label("20")]);
        assert!(added.is_empty());
        assert_eq!(graph.edges()[0].label.as_deref(), Some("10"));
    }

    #[test]
    fn merge_is_idempotent() {
        let edges = vec![
            rel("a.com", "b.com", relation::CNAME_TO),
            rel("a.com", "1.1.1.1", relation::RESOLVES_TO),
        ];
        let once = merge(&[], &edges);
        let twice = merge(&once, &edges);
        assert_eq!(once, twice);
    }

    #[test]
    fn merge_is_order_insensitive_up_to_labels() {
        let a = vec![rel("a.com", "b.com", relation::CNAME_TO)];
        let b = vec![
            rel("A.com", "B.com", relation::CNAME_TO),
            rel("a.com", "c.com", relation::HAS_NS),
        ];
        let ab: HashSet<EdgeKey> = merge(&a, &b).iter().map(edge_key).collect();
        let ba: HashSet<EdgeKey> = merge(&b, &a).iter().map(edge_key).collect();
        assert_eq!(ab, ba);
    }

    #[test]
    fn incremental_merge_returns_only_new_edges() {
        let mut graph = RelationshipGraph::new();
        let first = graph.merge(&[rel("a.com", "1.1.1.1", relation::RESOLVES_TO)]);
        assert_eq!(first.len(), 1);
        let second = graph.merge(&[
            rel("a.com", "1.1.1.1", relation::RESOLVES_TO),
            rel("a.com", "ns.a.com", relation::HAS_NS),
        ]);
        assert_eq!(second, vec![rel("a.com", "ns.a.com", relation::HAS_NS)]);
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn empty_endpoints_are_discarded() {
        let mut graph = RelationshipGraph::new();
        let added = graph.merge(&[
            rel("", "1.1.1.1", relation::RESOLVES_TO),
            rel("a.com", " ", relation::RESOLVES_TO),
        ]);
        assert!(added.is_empty());
        assert!(graph.is_empty());
    }

    #[test]
    fn nodes_keep_first_seen_spelling() {
        let edges = vec![
            rel("Example.com", "1.2.3.4", relation::RESOLVES_TO),
            rel("example.com", "MX.example.com", relation::HAS_MX),
        ];
        let ids: Vec<String> = nodes(&edges).into_iter().map(|n| n.id).collect();
        assert_eq!(ids, ["Example.com", "1.2.3.4", "MX.example.com"]);
    }
}
