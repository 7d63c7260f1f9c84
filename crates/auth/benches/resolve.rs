//! Benchmarks for the permission resolution hot path.

use castellan_auth::{PermissionId, PermissionPolicy, Policy, Principal, Role, User, authorize};
use chrono::Utc;
use criterion::{Criterion, black_box, criterion_group, criterion_main};

fn perm(i: usize) -> PermissionId {
    // Cycle through a handful of resources so the sets stay realistic.
    let resources = ["posts", "users", "roles", "reports", "files"];
    let actions = ["read", "create", "update", "delete", "manage", "export"];
    PermissionId::parse(format!(
        "{}.{}",
        resources[i % resources.len()],
        actions[(i / resources.len()) % actions.len()]
    ))
    .unwrap()
}

fn wide_principal(role_perms: usize, grants: usize, revokes: usize) -> Principal {
    let mut role = Role::new("bench");
    for i in 0..role_perms {
        role.add_permission(perm(i));
    }

    let mut user = User::new("bench@example.com", "hash", role.id, Utc::now());
    for i in 0..grants {
        user.overrides.grant(perm(role_perms + i));
    }
    for i in 0..revokes {
        user.overrides.revoke(perm(i));
    }

    Principal::assemble(&user, Some(role)).unwrap()
}

fn bench_resolution(c: &mut Criterion) {
    let principal = wide_principal(20, 5, 5);

    c.bench_function("effective_permissions_30", |b| {
        b.iter(|| black_box(&principal).effective_permissions())
    });

    c.bench_function("has_permission_short_circuit", |b| {
        let revoked = perm(0);
        b.iter(|| black_box(&principal).has_permission(black_box(&revoked)))
    });
}

fn bench_authorize(c: &mut Criterion) {
    let principal = wide_principal(20, 5, 5);
    let effective = principal.effective_permissions();
    let policy = Policy::Permissions(PermissionPolicy::all_of([perm(6), perm(7)]));

    c.bench_function("authorize_all_of_two", |b| {
        b.iter(|| {
            authorize(
                black_box(&principal),
                black_box(&effective),
                black_box(&policy),
                None,
            )
        })
    });
}

criterion_group!(benches, bench_resolution, bench_authorize);
criterion_main!(benches);
