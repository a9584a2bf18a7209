//! Rebuilds ordered hop sequences from the unordered link sets returned by the
//! policy engine.

use hoppipolla_core::model::{Hop, IsdAsn, Link, ResolvedPath};
use tracing::debug;

/// Reconstructs every walk from `src` encoded in `links`, one [`ResolvedPath`] each.
///
/// An empty link set is the degenerate zero-hop path. Links that cannot be reached
/// from `src` once every walk has been consumed are dropped.
pub fn reconstruct_paths(src: IsdAsn, dst: IsdAsn, links: &[Link]) -> Vec<ResolvedPath> {
    if links.is_empty() {
        return vec![ResolvedPath::new(src, dst, Vec::new())];
    }

    let mut pool = links.to_vec();
    let mut paths = Vec::new();
    while !pool.is_empty() {
        let hops = walk(src, dst, &mut pool);
        if hops.is_empty() {
            debug!(
                "Dropping {} link(s) unreachable from {} towards {}",
                pool.len(),
                src,
                dst
            );
            break;
        }
        paths.push(ResolvedPath::new(src, dst, hops));
    }
    paths
}

/// Follows one walk from `src`, consuming its links from `pool`.
///
/// The first link contributes both endpoints; later links contribute their target,
/// plus their origin when it is a different interface of the node just reached.
fn walk(src: IsdAsn, dst: IsdAsn, pool: &mut Vec<Link>) -> Vec<Hop> {
    let mut hops: Vec<Hop> = Vec::with_capacity(pool.len() * 2);

    while let Some(idx) = next_link(pool, src, hops.last().copied()) {
        let link = pool.remove(idx);
        if hops.last() != Some(&link.origin()) {
            hops.push(link.origin());
        }
        hops.push(link.target());

        if link.as_b == dst {
            break;
        }
    }
    hops
}

/// Picks the link continuing from `cursor`: exact (node, interface) continuity wins,
/// otherwise the first link leaving the same node in pool order.
fn next_link(pool: &[Link], src: IsdAsn, cursor: Option<Hop>) -> Option<usize> {
    match cursor {
        None => pool.iter().position(|link| link.as_a == src),
        Some(hop) => pool
            .iter()
            .position(|link| link.origin() == hop)
            .or_else(|| pool.iter().position(|link| link.as_a == hop.node)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ia(raw: &str) -> IsdAsn {
        raw.parse().unwrap()
    }

    #[test]
    fn first_link_contributes_both_endpoints() {
        let (a, b, c) = (ia("1-ff00:0:110"), ia("1-ff00:0:111"), ia("1-ff00:0:112"));
        let links = vec![Link::new(a, 1, b, 1), Link::new(b, 2, c, 1)];

        let paths = reconstruct_paths(a, c, &links);

        assert_eq!(paths.len(), 1);
        assert_eq!(
            paths[0].hops,
            vec![
                Hop::new(a, 1),
                Hop::new(b, 1),
                Hop::new(b, 2),
                Hop::new(c, 1)
            ]
        );
        assert_eq!(paths[0].src, a);
        assert_eq!(paths[0].dst, c);
    }

    #[test]
    fn intra_domain_links_do_not_duplicate_hops() {
        let (a, b, c) = (ia("1-ff00:0:110"), ia("1-ff00:0:111"), ia("1-ff00:0:112"));
        let links = vec![
            Link::new(b, 2, c, 1),
            Link::new(b, 1, b, 2),
            Link::new(a, 1, b, 1),
        ];

        let paths = reconstruct_paths(a, c, &links);

        assert_eq!(paths.len(), 1);
        assert_eq!(
            paths[0].hops,
            vec![
                Hop::new(a, 1),
                Hop::new(b, 1),
                Hop::new(b, 2),
                Hop::new(c, 1)
            ]
        );
    }

    #[test]
    fn empty_link_set_is_zero_hop_path() {
        let (a, c) = (ia("1-ff00:0:110"), ia("1-ff00:0:112"));
        let paths = reconstruct_paths(a, c, &[]);
        assert_eq!(paths, vec![ResolvedPath::new(a, c, Vec::new())]);
    }

    #[test]
    fn disjoint_walks_yield_one_path_each() {
        let (a, b, c, d) = (
            ia("1-ff00:0:110"),
            ia("1-ff00:0:111"),
            ia("1-ff00:0:112"),
            ia("1-ff00:0:113"),
        );
        let links = vec![
            Link::new(a, 1, b, 1),
            Link::new(a, 2, d, 1),
            Link::new(b, 1, b, 2),
            Link::new(d, 1, d, 3),
            Link::new(b, 2, c, 1),
            Link::new(d, 3, c, 2),
        ];

        let paths = reconstruct_paths(a, c, &links);

        assert_eq!(paths.len(), 2);
        assert_eq!(
            paths[0].hops,
            vec![
                Hop::new(a, 1),
                Hop::new(b, 1),
                Hop::new(b, 2),
                Hop::new(c, 1)
            ]
        );
        assert_eq!(
            paths[1].hops,
            vec![
                Hop::new(a, 2),
                Hop::new(d, 1),
                Hop::new(d, 3),
                Hop::new(c, 2)
            ]
        );
    }

    #[test]
    fn parallel_links_follow_interface_continuity() {
        let (a, b, c) = (ia("1-ff00:0:110"), ia("1-ff00:0:111"), ia("1-ff00:0:112"));
        let links = vec![
            Link::new(a, 1, b, 1),
            Link::new(a, 2, b, 3),
            Link::new(b, 3, b, 4),
            Link::new(b, 1, b, 2),
            Link::new(b, 2, c, 1),
            Link::new(b, 4, c, 2),
        ];

        let paths = reconstruct_paths(a, c, &links);

        assert_eq!(paths.len(), 2);
        assert_eq!(
            paths[0].hops,
            vec![
                Hop::new(a, 1),
                Hop::new(b, 1),
                Hop::new(b, 2),
                Hop::new(c, 1)
            ]
        );
        assert_eq!(
            paths[1].hops,
            vec![
                Hop::new(a, 2),
                Hop::new(b, 3),
                Hop::new(b, 4),
                Hop::new(c, 2)
            ]
        );
    }

    #[test]
    fn links_unreachable_from_source_are_dropped() {
        let (a, b, c, x) = (
            ia("1-ff00:0:110"),
            ia("1-ff00:0:111"),
            ia("1-ff00:0:112"),
            ia("2-ff00:0:210"),
        );
        let links = vec![
            Link::new(a, 1, b, 1),
            Link::new(x, 1, c, 9),
            Link::new(b, 2, c, 1),
        ];

        let paths = reconstruct_paths(a, c, &links);

        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].hops.last(), Some(&Hop::new(c, 1)));
    }

    #[test]
    fn walk_stops_at_destination() {
        let (a, b) = (ia("1-ff00:0:110"), ia("1-ff00:0:111"));
        let links = vec![
            Link::new(a, 1, b, 1),
            Link::new(a, 2, b, 2),
        ];

        let paths = reconstruct_paths(a, b, &links);

        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].hops, vec![Hop::new(a, 1), Hop::new(b, 1)]);
        assert_eq!(paths[1].hops, vec![Hop::new(a, 2), Hop::new(b, 2)]);
    }
}
