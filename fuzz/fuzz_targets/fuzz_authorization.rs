#![no_main]

use arbitrary::Arbitrary;
use ember_core::authorization::prune_and_filter;
use ember_core::entities::InstanceDescriptor;
use ember_core::ledger::UnlockLedger;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct FuzzInstance {
    name: String,
    password: Option<String>,
    whitelist_active: bool,
    whitelist: Vec<String>,
}

#[derive(Debug, Arbitrary)]
struct FuzzGrant {
    instance: String,
    user: String,
    code: Option<String>,
}

#[derive(Debug, Arbitrary)]
struct Input {
    instances: Vec<FuzzInstance>,
    grants: Vec<FuzzGrant>,
    account: Option<String>,
}

fuzz_target!(|input: Input| {
    let instances: Vec<InstanceDescriptor> = input
        .instances
        .into_iter()
        .map(|i| {
            let mut instance = InstanceDescriptor::new(i.name);
            instance.password = i.password;
            instance.whitelist_active = i.whitelist_active;
            instance.whitelist = i.whitelist;
            instance
        })
        .collect();

    let mut ledger = UnlockLedger::new();
    for grant in &input.grants {
        ledger.grant(&grant.instance, &grant.user, grant.code.as_deref());
    }

    let outcome = prune_and_filter(&instances, input.account.as_deref(), &mut ledger);

    // Filtering never invents instances and a second prune is a no-op
    assert!(outcome.visible.len() <= instances.len());
    assert!(!ledger.prune(&instances));
});
