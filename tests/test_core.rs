use std::cell::RefCell;
use std::rc::Rc;

use sugars::{rc, refcell};

use cloudsim::broker::Broker;
use cloudsim::cloudlet::{Cloudlet, CloudletState};
use cloudsim::datacenter::Datacenter;
use cloudsim::event::{Event, EventPayload, EventType};
use cloudsim::host::Host;
use cloudsim::resources::pe::{Pe, PeState};
use cloudsim::simulator::{SimulationStatus, Simulator};
use cloudsim::vm::{Vm, VmState};

const HOST_RAM: f64 = 32_768.0;
const HOST_STORAGE: f64 = 1_048_576.0;
const HOST_BANDWIDTH: f64 = 10_000.0;

fn make_host(num_pes: usize, mips: f64) -> Host {
    let pes = (0..num_pes).map(|_| Pe::new(mips).unwrap()).collect();
    Host::new(pes, HOST_RAM, HOST_STORAGE, HOST_BANDWIDTH).unwrap()
}

fn make_vm(num_pes: u32, startup: f64, shutdown: f64) -> Rc<RefCell<Vm>> {
    rc!(refcell!(
        Vm::new(1.0, num_pes, 1024.0, 10_240.0, 100.0, startup, shutdown).unwrap()
    ))
}

fn make_cloudlet(length: f64, num_pes: u32, utilization: f64) -> Rc<RefCell<Cloudlet>> {
    rc!(refcell!(
        Cloudlet::new(length, num_pes, utilization, 1.0, 1.0, 1.0).unwrap()
    ))
}

// Resource-conservation checks: per host, available + hosted = total for PEs
// and every fungible counter; per VM, busy virtual PEs match the PEs claimed
// by its cloudlets and pair with busy host PEs of that host.
fn assert_datacenter_invariants(datacenter: &Rc<RefCell<Datacenter>>) {
    let datacenter = datacenter.borrow();
    for host in datacenter.host_running_dict().values() {
        let host = host.borrow();
        let hosted_pes: u32 = host.vms().values().map(|vm| vm.borrow().num_pes()).sum();
        assert_eq!(host.num_pes_available() + hosted_pes, host.num_pes());
        let hosted_ram: f64 = host.vms().values().map(|vm| vm.borrow().size_ram()).sum();
        assert_eq!(host.ram().available() + hosted_ram, host.ram().capacity());
        let hosted_storage: f64 = host.vms().values().map(|vm| vm.borrow().size_storage()).sum();
        assert_eq!(host.storage().available() + hosted_storage, host.storage().capacity());
        let hosted_bandwidth: f64 = host.vms().values().map(|vm| vm.borrow().size_bandwidth()).sum();
        assert_eq!(
            host.bandwidth().available() + hosted_bandwidth,
            host.bandwidth().capacity()
        );

        for vm in host.vms().values() {
            let vm = vm.borrow();
            let claimed: u32 = vm.cloudlets().values().map(|c| c.borrow().num_pes()).sum();
            let busy = vm
                .vm_pes()
                .values()
                .filter(|vm_pe| vm_pe.pe().state() == PeState::Busy)
                .count() as u32;
            assert_eq!(busy, claimed);
            for vm_pe in vm.vm_pes().values() {
                assert!(host.pe_pairing().contains_key(&vm_pe.pe().id()));
                assert!(host
                    .pes()
                    .iter()
                    .any(|host_pe| Rc::ptr_eq(host_pe, vm_pe.host_pe())));
                assert_eq!(vm_pe.host_pe().borrow().state(), PeState::Busy);
            }
        }
    }
}

#[test]
// Two hosts x 4 PEs @ 1000 MIPS, two VMs x 2 PEs, four cloudlets x 1 PE x
// 1000 MI at full utilization: VMs boot at 30, cloudlets run in [30, 31],
// everything succeeds and no VM shuts down.
fn full_scenario_runs_to_completion() {
    let mut simulator = Simulator::new();
    let datacenter = Datacenter::new(vec![make_host(4, 1000.0), make_host(4, 1000.0)]);
    simulator.set_datacenter(datacenter.clone());
    let broker = Broker::new(&simulator, &datacenter);

    let vms = vec![make_vm(2, 30.0, 10.0), make_vm(2, 30.0, 10.0)];
    broker.submit_vm_list(&vms);
    for vm in &vms {
        assert_eq!(vm.borrow().state(), VmState::Submitted);
    }
    let cloudlets: Vec<_> = (0..4).map(|_| make_cloudlet(1000.0, 1, 1.0)).collect();
    broker.submit_cloudlet_list(&cloudlets);

    // pause mid-flight to observe the cloudlets running
    simulator.submit(Event::new(EventType::SimulationPause, EventPayload::None, 30.5));
    simulator.run_until_pause_or_terminate().unwrap();

    assert_eq!(simulator.state(), SimulationStatus::Paused);
    {
        let datacenter_ref = datacenter.borrow();
        assert_eq!(datacenter_ref.vm_running_dict().len(), 2);
        assert_eq!(datacenter_ref.cloudlet_running_dict().len(), 4);
        for vm in datacenter_ref.vm_running_dict().values() {
            let vm = vm.borrow();
            assert_eq!(vm.state(), VmState::Running);
            assert_eq!(vm.num_pes_available(), 0);
            assert_eq!(vm.cloudlets().len(), 2);
            assert_eq!(vm.mips(), 1000.0);
        }
        for cloudlet in &cloudlets {
            assert_eq!(cloudlet.borrow().state(), CloudletState::Running);
        }
    }
    assert_datacenter_invariants(&datacenter);

    simulator.run_until_pause_or_terminate().unwrap();

    assert_eq!(simulator.state(), SimulationStatus::Terminated);
    assert_eq!(simulator.global_clock(), 31.0);
    for cloudlet in &cloudlets {
        assert_eq!(cloudlet.borrow().state(), CloudletState::Succeeded);
    }
    // no shutdown was scheduled, so the VMs are still up
    for vm in &vms {
        assert_eq!(vm.borrow().state(), VmState::Running);
    }
    let datacenter_ref = datacenter.borrow();
    assert_eq!(datacenter_ref.cloudlet_running_dict().len(), 0);
    assert_eq!(datacenter_ref.cloudlet_end_of_life_dict().len(), 4);
    drop(datacenter_ref);
    assert_datacenter_invariants(&datacenter);
}

#[test]
// Same topology with five cloudlets: four run in [30, 31], the fifth waits
// for a released PE and finishes at 32.
fn fifth_cloudlet_waits_for_capacity() {
    let mut simulator = Simulator::new();
    let datacenter = Datacenter::new(vec![make_host(4, 1000.0), make_host(4, 1000.0)]);
    simulator.set_datacenter(datacenter.clone());
    let broker = Broker::new(&simulator, &datacenter);

    let vms = vec![make_vm(2, 30.0, 10.0), make_vm(2, 30.0, 10.0)];
    broker.submit_vm_list(&vms);
    let cloudlets: Vec<_> = (0..5).map(|_| make_cloudlet(1000.0, 1, 1.0)).collect();
    broker.submit_cloudlet_list(&cloudlets);

    simulator.run_until_pause_or_terminate().unwrap();

    assert_eq!(simulator.state(), SimulationStatus::Terminated);
    assert_eq!(simulator.global_clock(), 32.0);
    for cloudlet in &cloudlets {
        assert_eq!(cloudlet.borrow().state(), CloudletState::Succeeded);
    }
    assert_eq!(datacenter.borrow().cloudlet_end_of_life_dict().len(), 5);
}

#[test]
// VM_BIND is all-or-nothing: one host with 2 PEs cannot take two 2-PE VMs,
// both are canceled and the host is untouched.
fn vm_batch_too_large_is_canceled() {
    let mut simulator = Simulator::new();
    let datacenter = Datacenter::new(vec![make_host(2, 1000.0)]);
    simulator.set_datacenter(datacenter.clone());
    let broker = Broker::new(&simulator, &datacenter);

    let vms = vec![make_vm(2, 30.0, 10.0), make_vm(2, 30.0, 10.0)];
    broker.submit_vm_list(&vms);

    simulator.run_until_pause_or_terminate().unwrap();

    for vm in &vms {
        assert_eq!(vm.borrow().state(), VmState::Canceled);
    }
    let datacenter_ref = datacenter.borrow();
    assert_eq!(datacenter_ref.vm_booting_dict().len(), 0);
    assert_eq!(datacenter_ref.vm_running_dict().len(), 0);
    let host = datacenter_ref.host_running_dict().values().next().unwrap().borrow();
    assert_eq!(host.num_pes_available(), 2);
    assert_eq!(host.ram().available(), HOST_RAM);
    assert_eq!(host.storage().available(), HOST_STORAGE);
    assert_eq!(host.bandwidth().available(), HOST_BANDWIDTH);
}

#[test]
// After a successful batch of N VMs the datacenter has N more booting VMs and
// the host counters decreased by the requested amounts.
fn successful_vm_batch_books_resources() {
    let mut simulator = Simulator::new();
    let datacenter = Datacenter::new(vec![make_host(4, 1000.0)]);
    simulator.set_datacenter(datacenter.clone());
    let broker = Broker::new(&simulator, &datacenter);

    let vms = vec![make_vm(2, 30.0, 10.0), make_vm(1, 30.0, 10.0)];
    broker.submit_vm_list(&vms);
    // stop before the VMs finish booting
    simulator.set_termination_time(1.0);

    simulator.run_until_pause_or_terminate().unwrap();

    let datacenter_ref = datacenter.borrow();
    assert_eq!(datacenter_ref.vm_booting_dict().len(), 2);
    for vm in &vms {
        assert_eq!(vm.borrow().state(), VmState::Bounded);
    }
    let host = datacenter_ref.host_running_dict().values().next().unwrap().borrow();
    assert_eq!(host.num_pes_available(), 1);
    assert_eq!(host.ram().available(), HOST_RAM - 2.0 * 1024.0);
    assert_eq!(host.storage().available(), HOST_STORAGE - 2.0 * 10_240.0);
    assert_eq!(host.bandwidth().available(), HOST_BANDWIDTH - 2.0 * 100.0);
    drop(host);
    drop(datacenter_ref);
    assert_datacenter_invariants(&datacenter);
}

#[test]
// A VM marked for shutdown shuts down right after its last cloudlet finishes
// and is destroyed after the shutdown delay, restoring the host.
fn scheduled_shutdown_after_last_cloudlet() {
    let mut simulator = Simulator::new();
    let datacenter = Datacenter::new(vec![make_host(4, 1000.0)]);
    simulator.set_datacenter(datacenter.clone());
    let broker = Broker::new(&simulator, &datacenter);

    let vm = make_vm(2, 30.0, 10.0);
    broker.submit_vm_list(&[vm.clone()]);
    let cloudlets: Vec<_> = (0..2).map(|_| make_cloudlet(1000.0, 1, 1.0)).collect();
    broker.submit_cloudlet_list(&cloudlets);

    // pause while the cloudlets run and mark the VM for shutdown
    simulator.submit(Event::new(EventType::SimulationPause, EventPayload::None, 30.5));
    simulator.run_until_pause_or_terminate().unwrap();
    assert_eq!(simulator.state(), SimulationStatus::Paused);
    {
        let datacenter_ref = datacenter.borrow();
        let vm_running = datacenter_ref.vm_running_dict().values().next().unwrap();
        vm_running.borrow_mut().set_scheduled_to_shutdown(true);
    }

    simulator.run_until_pause_or_terminate().unwrap();

    assert_eq!(simulator.state(), SimulationStatus::Terminated);
    // cloudlets end at 31, shutdown at 31, destroy at 31 + 10
    assert_eq!(simulator.global_clock(), 41.0);
    assert_eq!(vm.borrow().state(), VmState::Destroyed);
    for cloudlet in &cloudlets {
        assert_eq!(cloudlet.borrow().state(), CloudletState::Succeeded);
    }
    let datacenter_ref = datacenter.borrow();
    assert_eq!(datacenter_ref.vm_running_dict().len(), 0);
    assert_eq!(datacenter_ref.vm_end_of_life_dict().len(), 1);
    let host = datacenter_ref.host_running_dict().values().next().unwrap().borrow();
    assert_eq!(host.num_pes_available(), 4);
    assert_eq!(host.ram().available(), HOST_RAM);
    assert!(host.pes().iter().all(|pe| pe.borrow().state() == PeState::Free));
}

#[test]
// Cloudlets on an undersized VM run strictly in submission order.
fn cloudlets_run_in_fifo_order() {
    let mut simulator = Simulator::new();
    let datacenter = Datacenter::new(vec![make_host(4, 1000.0)]);
    simulator.set_datacenter(datacenter.clone());
    let broker = Broker::new(&simulator, &datacenter);

    broker.submit_vm_list(&[make_vm(1, 30.0, 10.0)]);
    let cloudlets = vec![
        make_cloudlet(1000.0, 1, 1.0),
        make_cloudlet(2000.0, 1, 1.0),
        make_cloudlet(3000.0, 1, 1.0),
    ];
    broker.submit_cloudlet_list(&cloudlets);

    simulator.run_until_pause_or_terminate().unwrap();

    // 30 -> 31, 31 -> 33, 33 -> 36: one at a time, in submission order
    assert_eq!(simulator.global_clock(), 36.0);
    for cloudlet in &cloudlets {
        assert_eq!(cloudlet.borrow().state(), CloudletState::Succeeded);
    }
}

#[test]
// The waiting queue is FIFO-first: an oversized head blocks smaller cloudlets
// behind it, and termination cancels the whole queue.
fn oversized_head_blocks_queue_until_termination() {
    let mut simulator = Simulator::new();
    let datacenter = Datacenter::new(vec![make_host(4, 1000.0)]);
    simulator.set_datacenter(datacenter.clone());
    let broker = Broker::new(&simulator, &datacenter);

    broker.submit_vm_list(&[make_vm(1, 30.0, 10.0)]);
    let blocked = vec![make_cloudlet(1000.0, 2, 1.0), make_cloudlet(1000.0, 1, 1.0)];
    broker.submit_cloudlet_list(&blocked);

    simulator.run_until_pause_or_terminate().unwrap();

    assert_eq!(simulator.state(), SimulationStatus::Terminated);
    assert_eq!(simulator.global_clock(), 30.0);
    for cloudlet in &blocked {
        assert_eq!(cloudlet.borrow().state(), CloudletState::Canceled);
    }
    let datacenter_ref = datacenter.borrow();
    assert_eq!(datacenter_ref.cloudlet_waiting_deque().len(), 0);
    assert_eq!(datacenter_ref.cloudlet_end_of_life_dict().len(), 2);
}

#[test]
// Execution time is rounded to two decimals: 1000 MI on a 1000 MIPS PE at
// utilization 0.33 runs for round(3.0303.., 2) = 3.03.
fn exec_time_is_rounded_to_two_decimals() {
    let mut simulator = Simulator::new();
    let datacenter = Datacenter::new(vec![make_host(2, 1000.0)]);
    simulator.set_datacenter(datacenter.clone());
    let broker = Broker::new(&simulator, &datacenter);

    broker.submit_vm_list(&[make_vm(1, 0.0, 0.0)]);
    let cloudlet = make_cloudlet(1000.0, 1, 0.33);
    broker.submit_cloudlet_list(&[cloudlet.clone()]);

    simulator.run_until_pause_or_terminate().unwrap();

    assert_eq!(simulator.global_clock(), 3.03);
    assert_eq!(cloudlet.borrow().state(), CloudletState::Succeeded);
}

#[test]
// Termination shuts nothing down mid-flight but archives every waiting
// cloudlet as canceled.
fn termination_cancels_waiting_cloudlets() {
    let mut simulator = Simulator::new();
    let datacenter = Datacenter::new(vec![make_host(2, 1000.0)]);
    simulator.set_datacenter(datacenter.clone());
    let broker = Broker::new(&simulator, &datacenter);

    broker.submit_vm_list(&[make_vm(2, 30.0, 10.0)]);
    let cloudlets: Vec<_> = (0..3).map(|_| make_cloudlet(1000.0, 2, 1.0)).collect();
    broker.submit_cloudlet_list(&cloudlets);
    // terminate before the VM even boots
    simulator.set_termination_time(10.0);

    simulator.run_until_pause_or_terminate().unwrap();

    assert_eq!(simulator.global_clock(), 10.0);
    for cloudlet in &cloudlets {
        assert_eq!(cloudlet.borrow().state(), CloudletState::Canceled);
    }
    assert_eq!(datacenter.borrow().cloudlet_waiting_deque().len(), 0);
    assert_eq!(datacenter.borrow().cloudlet_end_of_life_dict().len(), 3);
}
